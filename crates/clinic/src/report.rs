//! Daily clinic report built from the read models.

use std::fmt;

use chrono::NaiveDate;
use event_store::EventStore;
use projections::{
    InventoryAlerts, InventoryAlertsView, OutstandingBalance, PaymentLedgerView,
    ProfessionalRevenue, ProjectionProcessor,
};
use serde_json::{Value, json};

use crate::config::ClinicConfig;
use crate::error::Result;

/// Inventory alerts and the state of the payment ledger on one day.
#[derive(Debug, Clone)]
pub struct ClinicReport {
    pub day: NaiveDate,
    pub events_processed: u64,
    pub inventory: InventoryAlerts,
    pub outstanding: Vec<OutstandingBalance>,
    pub revenue: Vec<ProfessionalRevenue>,
}

impl ClinicReport {
    /// Replays the whole log into fresh views and reads them.
    #[tracing::instrument(skip(store, config))]
    pub async fn collect<S: EventStore>(
        store: S,
        config: &ClinicConfig,
        day: NaiveDate,
    ) -> Result<Self> {
        let alerts = InventoryAlertsView::with_near_expiry_days(config.near_expiry_days);
        let ledger = PaymentLedgerView::new();

        let mut processor = ProjectionProcessor::new(store);
        processor.register(Box::new(alerts.clone()));
        processor.register(Box::new(ledger.clone()));
        let events_processed = processor.run_catch_up().await?;

        Ok(Self {
            day,
            events_processed,
            inventory: alerts.alerts(day).await,
            outstanding: ledger.outstanding_balances().await,
            revenue: ledger.totals_by_professional().await,
        })
    }

    pub fn to_json(&self) -> Value {
        json!({
            "day": self.day.to_string(),
            "eventsProcessed": self.events_processed,
            "inventory": {
                "restock": self.inventory.restock.iter().map(|m| json!({
                    "medicationId": m.medication_id.to_string(),
                    "name": m.name,
                    "stock": m.stock(),
                    "minimumStock": m.minimum_stock,
                })).collect::<Vec<_>>(),
                "nearExpiry": self.inventory.near_expiry.iter().map(expiry_json).collect::<Vec<_>>(),
                "expired": self.inventory.expired.iter().map(expiry_json).collect::<Vec<_>>(),
            },
            "outstanding": self.outstanding.iter().map(|b| json!({
                "paymentId": b.payment_id.to_string(),
                "code": b.code,
                "state": b.state.as_str(),
                "amount": b.amount.to_string(),
                "amountPaid": b.amount_paid.to_string(),
                "outstanding": b.outstanding.to_string(),
            })).collect::<Vec<_>>(),
            "revenue": self.revenue.iter().map(|r| json!({
                "professionalId": r.professional_id.as_uuid().to_string(),
                "payments": r.payments,
                "companyTotal": r.company_total.to_string(),
                "professionalTotal": r.professional_total.to_string(),
            })).collect::<Vec<_>>(),
        })
    }
}

fn expiry_json(alert: &projections::ExpiryAlert) -> Value {
    json!({
        "medicationId": alert.medication_id.to_string(),
        "medication": alert.medication_name,
        "lot": alert.lot_code,
        "quantity": alert.quantity,
        "expiresOn": alert.expires_on.to_string(),
    })
}

impl fmt::Display for ClinicReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Clinic report for {} ({} events)", self.day, self.events_processed)?;

        writeln!(f, "\nRestock needed:")?;
        for m in &self.inventory.restock {
            writeln!(f, "  {:<24} stock {:>4} (min {})", m.name, m.stock(), m.minimum_stock)?;
        }
        writeln!(f, "\nExpiring soon:")?;
        for a in &self.inventory.near_expiry {
            writeln!(
                f,
                "  {:<24} lot {:<10} {:>4} units, expires {}",
                a.medication_name,
                a.lot_code.as_deref().unwrap_or("-"),
                a.quantity,
                a.expires_on
            )?;
        }
        writeln!(f, "\nExpired:")?;
        for a in &self.inventory.expired {
            writeln!(
                f,
                "  {:<24} lot {:<10} {:>4} units, expired {}",
                a.medication_name,
                a.lot_code.as_deref().unwrap_or("-"),
                a.quantity,
                a.expires_on
            )?;
        }

        writeln!(f, "\nOutstanding payments:")?;
        for b in &self.outstanding {
            writeln!(
                f,
                "  {} {:<10} paid {:>10} of {:>10}, owed {:>10}",
                b.code,
                b.state.as_str(),
                b.amount_paid.to_string(),
                b.amount.to_string(),
                b.outstanding.to_string()
            )?;
        }
        writeln!(f, "\nRevenue by professional:")?;
        for r in &self.revenue {
            writeln!(
                f,
                "  {} {:>3} payments, professional {:>10}, clinic {:>10}",
                r.professional_id.as_uuid(),
                r.payments,
                r.professional_total.to_string(),
                r.company_total.to_string()
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::{
        ClientId, CreatePayment, InventoryService, LotIntake, Money, PaymentMethod,
        PaymentService, QrSettings, RegisterMedication,
    };
    use event_store::InMemoryEventStore;

    #[tokio::test]
    async fn report_reads_both_views() {
        let store = InMemoryEventStore::new();
        let inventory = InventoryService::new(store.clone());
        let payments = PaymentService::new(store.clone(), QrSettings::default());

        let cmd = RegisterMedication::named("Amoxicillin")
            .with_minimum_stock(5)
            .with_initial_stock(LotIntake::new(2).with_code("A-1"));
        inventory.register_medication(cmd).await.unwrap();
        payments
            .create_payment(CreatePayment::new(
                Money::from_major(35),
                PaymentMethod::Cash,
                ClientId::new(),
            ))
            .await
            .unwrap();

        let day = NaiveDate::from_ymd_opt(2025, 1, 10).unwrap();
        let report = ClinicReport::collect(store, &ClinicConfig::default(), day)
            .await
            .unwrap();

        assert_eq!(report.inventory.restock.len(), 1);
        assert_eq!(report.outstanding.len(), 1);
        assert!(report.revenue.is_empty());

        let json = report.to_json();
        assert_eq!(json["inventory"]["restock"][0]["stock"], 2);
        assert_eq!(json["outstanding"][0]["outstanding"], "35.00");

        let text = report.to_string();
        assert!(text.contains("Amoxicillin"));
        assert!(text.contains(&report.outstanding[0].code));
    }
}
