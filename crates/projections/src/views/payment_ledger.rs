//! Payment ledger read model: balances, audit trails and revenue per professional.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::AggregateId;
use domain::{
    Aggregate, Money, Payment, PaymentEvent, PaymentHistoryEntry, PaymentState, ProfessionalId,
};
use event_store::EventEnvelope;
use tokio::sync::RwLock;

use crate::Result;
use crate::projection::{Projection, ProjectionPosition, decode_for};
use crate::read_model::ReadModel;

/// A payment that still has something owed on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutstandingBalance {
    pub payment_id: AggregateId,
    pub code: String,
    pub state: PaymentState,
    pub amount: Money,
    pub amount_paid: Money,
    pub outstanding: Money,
}

/// Settled revenue attributed to one professional.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfessionalRevenue {
    pub professional_id: ProfessionalId,
    pub payments: usize,
    pub company_total: Money,
    pub professional_total: Money,
}

struct LedgerState {
    payments: HashMap<AggregateId, Payment>,
    position: ProjectionPosition,
}

/// Folds payment events into full payment states, the same way the
/// aggregate replays its own stream, so history entries match the write side.
#[derive(Clone)]
pub struct PaymentLedgerView {
    state: Arc<RwLock<LedgerState>>,
}

impl PaymentLedgerView {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(LedgerState {
                payments: HashMap::new(),
                position: ProjectionPosition::zero(),
            })),
        }
    }

    pub async fn get_payment(&self, payment_id: AggregateId) -> Option<Payment> {
        self.state.read().await.payments.get(&payment_id).cloned()
    }

    pub async fn history_for(&self, payment_id: AggregateId) -> Vec<PaymentHistoryEntry> {
        self.state
            .read()
            .await
            .payments
            .get(&payment_id)
            .map(|p| p.history().to_vec())
            .unwrap_or_default()
    }

    /// Open payments with a balance, ordered by code.
    pub async fn outstanding_balances(&self) -> Vec<OutstandingBalance> {
        let state = self.state.read().await;
        let mut balances: Vec<_> = state
            .payments
            .iter()
            .filter(|(_, p)| p.state().is_open() && p.outstanding().is_positive())
            .map(|(id, p)| OutstandingBalance {
                payment_id: *id,
                code: p.code().to_string(),
                state: p.state(),
                amount: p.amount(),
                amount_paid: p.amount_paid(),
                outstanding: p.outstanding(),
            })
            .collect();
        balances.sort_by(|a, b| a.code.cmp(&b.code));
        balances
    }

    pub async fn total_outstanding(&self) -> Money {
        self.outstanding_balances()
            .await
            .iter()
            .map(|b| b.outstanding)
            .sum()
    }

    /// Completed payments grouped by professional. Refunded payments no
    /// longer count.
    pub async fn totals_by_professional(&self) -> Vec<ProfessionalRevenue> {
        let state = self.state.read().await;
        let mut totals: HashMap<ProfessionalId, ProfessionalRevenue> = HashMap::new();

        for payment in state.payments.values() {
            if payment.state() != PaymentState::Completed {
                continue;
            }
            let (Some(professional_id), Some(split)) = (payment.professional_id(), payment.split())
            else {
                continue;
            };
            let entry = totals
                .entry(professional_id)
                .or_insert_with(|| ProfessionalRevenue {
                    professional_id,
                    payments: 0,
                    company_total: Money::ZERO,
                    professional_total: Money::ZERO,
                });
            entry.payments += 1;
            entry.company_total += split.company_amount;
            entry.professional_total += split.professional_amount;
        }

        let mut list: Vec<_> = totals.into_values().collect();
        list.sort_by(|a, b| b.professional_total.cmp(&a.professional_total));
        list
    }
}

impl Default for PaymentLedgerView {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Projection for PaymentLedgerView {
    fn name(&self) -> &'static str {
        "PaymentLedgerView"
    }

    async fn handle(&self, event: &EventEnvelope) -> Result<()> {
        let decoded: Option<PaymentEvent> = decode_for(event, Payment::aggregate_type())?;
        let mut state = self.state.write().await;

        if let Some(payment_event) = decoded {
            let payment = state.payments.entry(event.aggregate_id).or_default();
            payment.apply(payment_event);
            payment.set_version(event.version);
        }

        state.position = state.position.advance();
        Ok(())
    }

    async fn position(&self) -> ProjectionPosition {
        self.state.read().await.position
    }

    async fn reset(&self) -> Result<()> {
        let mut state = self.state.write().await;
        state.payments.clear();
        state.position = ProjectionPosition::zero();
        Ok(())
    }
}

impl ReadModel for PaymentLedgerView {
    fn name(&self) -> &'static str {
        "PaymentLedgerView"
    }

    fn count(&self) -> usize {
        self.state.try_read().map(|s| s.payments.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use common::ActorId;
    use domain::{
        ClientId, CreatePayment, DomainEvent, HistoryAction, PaymentMethod, QrSettings, Settlement,
    };

    async fn feed(view: &PaymentLedgerView, payment: &mut Payment, events: Vec<PaymentEvent>) {
        for event in events {
            payment.apply(event.clone());
            let version = payment.version().next();
            payment.set_version(version);
            let envelope = EventEnvelope::builder()
                .aggregate_id(payment.id().unwrap())
                .aggregate_type("Payment")
                .event_type(event.event_type())
                .version(version)
                .payload(&event)
                .unwrap()
                .build()
                .unwrap();
            view.handle(&envelope).await.unwrap();
        }
    }

    async fn created(
        view: &PaymentLedgerView,
        code: &str,
        cents: i64,
        professional: Option<ProfessionalId>,
    ) -> Payment {
        let mut cmd = CreatePayment::new(Money::from_cents(cents), PaymentMethod::Cash, ClientId::new());
        if let Some(professional) = professional {
            cmd = cmd.with_professional(professional);
        }
        let mut payment = Payment::default();
        let events = payment
            .create(&cmd, code.to_string(), &QrSettings::default(), Utc::now())
            .unwrap();
        feed(view, &mut payment, events).await;
        payment
    }

    async fn complete(view: &PaymentLedgerView, payment: &mut Payment) {
        let events = payment.mark_completed(Settlement::new(), Utc::now()).unwrap();
        feed(view, payment, events).await;
    }

    #[tokio::test]
    async fn outstanding_follows_partial_payments() {
        let view = PaymentLedgerView::new();
        let mut first = created(&view, "PAG-20250110-0001", 10_000, None).await;
        created(&view, "PAG-20250110-0002", 5_000, None).await;

        let events = first
            .add_partial_payment(Money::from_cents(4_000), ActorId::new("cashier-1"), Utc::now())
            .unwrap();
        feed(&view, &mut first, events).await;

        let balances = view.outstanding_balances().await;
        let codes: Vec<_> = balances.iter().map(|b| b.code.as_str()).collect();
        assert_eq!(codes, vec!["PAG-20250110-0001", "PAG-20250110-0002"]);
        assert_eq!(balances[0].outstanding, Money::from_cents(6_000));
        assert_eq!(view.total_outstanding().await, Money::from_cents(11_000));
    }

    #[tokio::test]
    async fn completed_payments_leave_the_balance_list() {
        let view = PaymentLedgerView::new();
        let mut payment = created(&view, "PAG-20250110-0001", 3_500, None).await;

        complete(&view, &mut payment).await;

        assert!(view.outstanding_balances().await.is_empty());
        assert_eq!(view.total_outstanding().await, Money::ZERO);
    }

    #[tokio::test]
    async fn history_matches_the_aggregate() {
        let view = PaymentLedgerView::new();
        let mut payment = created(&view, "PAG-20250110-0001", 3_500, None).await;
        complete(&view, &mut payment).await;

        let history = view.history_for(payment.id().unwrap()).await;
        let actions: Vec<_> = history.iter().map(|h| h.action).collect();
        assert_eq!(
            actions,
            vec![
                HistoryAction::Created,
                HistoryAction::SplitCalculated,
                HistoryAction::Completed,
            ]
        );
        assert_eq!(history, payment.history());
    }

    #[tokio::test]
    async fn revenue_excludes_refunded_payments() {
        let view = PaymentLedgerView::new();
        let vet = ProfessionalId::new();
        let mut kept = created(&view, "PAG-20250110-0001", 10_000, Some(vet)).await;
        let mut refunded = created(&view, "PAG-20250110-0002", 20_000, Some(vet)).await;
        created(&view, "PAG-20250110-0003", 40_000, Some(vet)).await;
        complete(&view, &mut kept).await;
        complete(&view, &mut refunded).await;

        let events = refunded
            .refund(
                Some("duplicate charge".to_string()),
                Some(ActorId::new("admin")),
                Utc::now(),
            )
            .unwrap();
        feed(&view, &mut refunded, events).await;

        let totals = view.totals_by_professional().await;
        assert_eq!(totals.len(), 1);
        assert_eq!(totals[0].payments, 1);
        let split = kept.split().unwrap();
        assert_eq!(totals[0].company_total, split.company_amount);
        assert_eq!(totals[0].professional_total, split.professional_amount);
        assert_eq!(
            totals[0].company_total + totals[0].professional_total,
            Money::from_cents(10_000)
        );
    }

    #[tokio::test]
    async fn reset_clears_payments() {
        let view = PaymentLedgerView::new();
        created(&view, "PAG-20250110-0001", 3_500, None).await;
        assert_eq!(ReadModel::count(&view), 1);

        view.reset().await.unwrap();

        assert_eq!(ReadModel::count(&view), 0);
        assert_eq!(view.position().await, ProjectionPosition::zero());
    }
}
