//! Inventory alerts read model: restock, near-expiry and expired stock.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use common::AggregateId;
use domain::{LotId, MedicationEvent};
use event_store::EventEnvelope;
use tokio::sync::RwLock;

use crate::Result;
use crate::projection::{Projection, ProjectionPosition, decode_for};
use crate::read_model::ReadModel;

/// Days ahead that count as "near expiry" unless configured otherwise.
pub const DEFAULT_NEAR_EXPIRY_DAYS: u32 = 30;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LotStock {
    pub lot_id: LotId,
    pub code: Option<String>,
    pub quantity: u32,
    pub expires_on: Option<NaiveDate>,
}

/// Stock of one medication as seen by the alerts view.
#[derive(Debug, Clone)]
pub struct MedicationStock {
    pub medication_id: AggregateId,
    pub name: String,
    pub code: Option<String>,
    pub minimum_stock: u32,
    pub active: bool,
    /// Receipt order.
    pub lots: Vec<LotStock>,
}

impl MedicationStock {
    pub fn stock(&self) -> u32 {
        self.lots.iter().map(|l| l.quantity).sum()
    }

    pub fn needs_restock(&self) -> bool {
        self.stock() <= self.minimum_stock
    }
}

/// A lot with stock that has expired or is about to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpiryAlert {
    pub medication_id: AggregateId,
    pub medication_name: String,
    pub lot_id: LotId,
    pub lot_code: Option<String>,
    pub quantity: u32,
    pub expires_on: NaiveDate,
}

#[derive(Debug, Clone, Default)]
pub struct InventoryAlerts {
    pub restock: Vec<MedicationStock>,
    pub near_expiry: Vec<ExpiryAlert>,
    pub expired: Vec<ExpiryAlert>,
}

impl InventoryAlerts {
    pub fn is_empty(&self) -> bool {
        self.restock.is_empty() && self.near_expiry.is_empty() && self.expired.is_empty()
    }
}

struct AlertsState {
    medications: HashMap<AggregateId, MedicationStock>,
    position: ProjectionPosition,
}

/// Medications that need attention. Deactivated medications never alert.
#[derive(Clone)]
pub struct InventoryAlertsView {
    state: Arc<RwLock<AlertsState>>,
    near_expiry_days: u32,
}

impl InventoryAlertsView {
    pub fn new() -> Self {
        Self::with_near_expiry_days(DEFAULT_NEAR_EXPIRY_DAYS)
    }

    pub fn with_near_expiry_days(days: u32) -> Self {
        Self {
            state: Arc::new(RwLock::new(AlertsState {
                medications: HashMap::new(),
                position: ProjectionPosition::zero(),
            })),
            near_expiry_days: days,
        }
    }

    pub fn near_expiry_days(&self) -> u32 {
        self.near_expiry_days
    }

    pub async fn get_medication(&self, medication_id: AggregateId) -> Option<MedicationStock> {
        self.state.read().await.medications.get(&medication_id).cloned()
    }

    /// Active medications at or below their minimum, lowest stock first.
    pub async fn restock_needed(&self) -> Vec<MedicationStock> {
        let state = self.state.read().await;
        let mut list: Vec<_> = state
            .medications
            .values()
            .filter(|m| m.active && m.needs_restock())
            .cloned()
            .collect();
        list.sort_by(|a, b| a.stock().cmp(&b.stock()).then_with(|| a.name.cmp(&b.name)));
        list
    }

    /// Lots expiring after `today` but within the window, soonest first.
    pub async fn near_expiry(&self, today: NaiveDate) -> Vec<ExpiryAlert> {
        let horizon = today
            .checked_add_days(chrono::Days::new(u64::from(self.near_expiry_days)))
            .unwrap_or(NaiveDate::MAX);
        self.lots_matching(|expires_on| expires_on > today && expires_on <= horizon)
            .await
    }

    /// Lots at or past their expiry date that still hold stock.
    pub async fn expired(&self, today: NaiveDate) -> Vec<ExpiryAlert> {
        self.lots_matching(|expires_on| expires_on <= today).await
    }

    pub async fn alerts(&self, today: NaiveDate) -> InventoryAlerts {
        InventoryAlerts {
            restock: self.restock_needed().await,
            near_expiry: self.near_expiry(today).await,
            expired: self.expired(today).await,
        }
    }

    async fn lots_matching(&self, predicate: impl Fn(NaiveDate) -> bool) -> Vec<ExpiryAlert> {
        let state = self.state.read().await;
        let mut alerts: Vec<_> = state
            .medications
            .values()
            .filter(|m| m.active)
            .flat_map(|m| {
                m.lots.iter().filter_map(move |lot| {
                    let expires_on = lot.expires_on?;
                    (lot.quantity > 0).then(|| ExpiryAlert {
                        medication_id: m.medication_id,
                        medication_name: m.name.clone(),
                        lot_id: lot.lot_id,
                        lot_code: lot.code.clone(),
                        quantity: lot.quantity,
                        expires_on,
                    })
                })
            })
            .filter(|alert| predicate(alert.expires_on))
            .collect();
        alerts.sort_by(|a, b| {
            a.expires_on
                .cmp(&b.expires_on)
                .then_with(|| a.medication_name.cmp(&b.medication_name))
        });
        alerts
    }
}

impl Default for InventoryAlertsView {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Projection for InventoryAlertsView {
    fn name(&self) -> &'static str {
        "InventoryAlertsView"
    }

    async fn handle(&self, event: &EventEnvelope) -> Result<()> {
        let decoded: Option<MedicationEvent> = decode_for(event, "Medication")?;
        let mut state = self.state.write().await;

        if let Some(medication_event) = decoded {
            let medication_id = event.aggregate_id;
            match medication_event {
                MedicationEvent::MedicationRegistered(data) => {
                    state.medications.insert(
                        medication_id,
                        MedicationStock {
                            medication_id,
                            name: data.name,
                            code: data.code,
                            minimum_stock: data.minimum_stock,
                            active: true,
                            lots: Vec::new(),
                        },
                    );
                }
                MedicationEvent::LotReceived(data) => {
                    if let Some(medication) = state.medications.get_mut(&medication_id) {
                        medication.lots.push(LotStock {
                            lot_id: data.lot.id,
                            code: data.lot.code,
                            quantity: data.lot.quantity,
                            expires_on: data.lot.expires_on,
                        });
                    }
                }
                MedicationEvent::StockDispensed(data) => {
                    if let Some(medication) = state.medications.get_mut(&medication_id) {
                        for draw in &data.draws {
                            if let Some(lot) =
                                medication.lots.iter_mut().find(|l| l.lot_id == draw.lot_id)
                            {
                                lot.quantity = lot.quantity.saturating_sub(draw.quantity);
                            }
                        }
                    }
                }
                MedicationEvent::MedicationDeactivated(_) => {
                    if let Some(medication) = state.medications.get_mut(&medication_id) {
                        medication.active = false;
                    }
                }
            }
        }

        state.position = state.position.advance();
        Ok(())
    }

    async fn position(&self) -> ProjectionPosition {
        self.state.read().await.position
    }

    async fn reset(&self) -> Result<()> {
        let mut state = self.state.write().await;
        state.medications.clear();
        state.position = ProjectionPosition::zero();
        Ok(())
    }
}

impl ReadModel for InventoryAlertsView {
    fn name(&self) -> &'static str {
        "InventoryAlertsView"
    }

    fn count(&self) -> usize {
        self.state.try_read().map(|s| s.medications.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use domain::{
        Aggregate, DispenseReason, DomainEvent, LotIntake, Medication, RegisterMedication,
    };
    use event_store::Version;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// Runs `events` through a working copy and the view, the way a commit
    /// followed by delivery would.
    async fn feed(
        view: &InventoryAlertsView,
        medication: &mut Medication,
        events: Vec<MedicationEvent>,
    ) {
        let id = medication.id().unwrap_or_default();
        for event in events {
            medication.apply(event.clone());
            let id = medication.id().unwrap_or(id);
            let version = medication.version().next();
            medication.set_version(version);
            let envelope = EventEnvelope::builder()
                .aggregate_id(id)
                .aggregate_type("Medication")
                .event_type(event.event_type())
                .version(version)
                .payload(&event)
                .unwrap()
                .build()
                .unwrap();
            view.handle(&envelope).await.unwrap();
        }
    }

    async fn registered(view: &InventoryAlertsView, name: &str, minimum: u32) -> Medication {
        let mut medication = Medication::default();
        let cmd = RegisterMedication::named(name).with_minimum_stock(minimum);
        let events = medication.register(&cmd, Utc::now()).unwrap();
        feed(view, &mut medication, events).await;
        medication
    }

    async fn receive(view: &InventoryAlertsView, medication: &mut Medication, intake: LotIntake) {
        let events = medication.add_stock(&intake, Utc::now()).unwrap();
        feed(view, medication, events).await;
    }

    #[tokio::test]
    async fn restock_tracks_dispensed_stock() {
        let view = InventoryAlertsView::new();
        let mut medication = registered(&view, "Amoxicillin", 5).await;
        receive(&view, &mut medication, LotIntake::new(5).expiring(date(2025, 1, 10))).await;
        receive(&view, &mut medication, LotIntake::new(10).expiring(date(2025, 6, 1))).await;
        assert!(view.restock_needed().await.is_empty());

        let events = medication
            .dispense(
                10,
                DispenseReason::Adjustment {
                    note: "count".to_string(),
                },
                Utc::now(),
            )
            .unwrap();
        feed(&view, &mut medication, events).await;

        let restock = view.restock_needed().await;
        assert_eq!(restock.len(), 1);
        assert_eq!(restock[0].stock(), 5);
        assert_eq!(restock[0].stock(), medication.stock());
        assert_eq!(view.position().await.events_processed, 4);
    }

    #[tokio::test]
    async fn expiry_windows() {
        let view = InventoryAlertsView::with_near_expiry_days(30);
        let mut medication = registered(&view, "Meloxicam", 0).await;
        for (code, expires_on) in [
            ("OLD", Some(date(2025, 1, 10))),
            ("SOON", Some(date(2025, 2, 5))),
            ("LATER", Some(date(2025, 9, 1))),
            ("UNDATED", None),
        ] {
            let mut intake = LotIntake::new(3).with_code(code);
            intake.expires_on = expires_on;
            receive(&view, &mut medication, intake).await;
        }

        let today = date(2025, 1, 20);
        let alerts = view.alerts(today).await;
        let expired: Vec<_> = alerts.expired.iter().map(|a| a.lot_code.as_deref()).collect();
        let near: Vec<_> = alerts.near_expiry.iter().map(|a| a.lot_code.as_deref()).collect();

        assert_eq!(expired, vec![Some("OLD")]);
        assert_eq!(near, vec![Some("SOON")]);
        assert!(alerts.restock.is_empty());
    }

    #[tokio::test]
    async fn deactivated_medication_is_silent() {
        let view = InventoryAlertsView::new();
        let mut medication = registered(&view, "Old stock", 5).await;
        assert_eq!(view.restock_needed().await.len(), 1);

        let events = medication.deactivate(Utc::now()).unwrap();
        feed(&view, &mut medication, events).await;

        assert!(view.alerts(date(2025, 1, 1)).await.is_empty());
        assert!(!view.get_medication(medication.id().unwrap()).await.unwrap().active);
    }

    #[tokio::test]
    async fn other_aggregates_only_advance_position() {
        let view = InventoryAlertsView::new();
        let envelope = EventEnvelope::builder()
            .aggregate_id(AggregateId::new())
            .aggregate_type("Payment")
            .event_type("PaymentFailed")
            .version(Version::first())
            .payload_raw(serde_json::json!({"unrelated": true}))
            .build()
            .unwrap();

        view.handle(&envelope).await.unwrap();

        assert_eq!(view.position().await.events_processed, 1);
        assert_eq!(ReadModel::count(&view), 0);
    }

    #[tokio::test]
    async fn reset_clears_everything() {
        let view = InventoryAlertsView::new();
        registered(&view, "Amoxicillin", 5).await;

        view.reset().await.unwrap();

        assert_eq!(view.position().await, ProjectionPosition::zero());
        assert!(view.restock_needed().await.is_empty());
    }
}
