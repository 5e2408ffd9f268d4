//! Medication domain events.

use chrono::{DateTime, Utc};
use common::AggregateId;
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;
use crate::ids::LotId;
use crate::money::Money;

use super::{Lot, LotDraw};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum MedicationEvent {
    MedicationRegistered(MedicationRegisteredData),
    LotReceived(LotReceivedData),
    StockDispensed(StockDispensedData),
    MedicationDeactivated(MedicationDeactivatedData),
}

impl DomainEvent for MedicationEvent {
    fn event_type(&self) -> &'static str {
        match self {
            MedicationEvent::MedicationRegistered(_) => "MedicationRegistered",
            MedicationEvent::LotReceived(_) => "LotReceived",
            MedicationEvent::StockDispensed(_) => "StockDispensed",
            MedicationEvent::MedicationDeactivated(_) => "MedicationDeactivated",
        }
    }
}

/// Catalogue entry for a new medication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedicationRegisteredData {
    pub medication_id: AggregateId,
    pub code: Option<String>,
    pub name: String,
    pub active_ingredient: Option<String>,
    /// e.g. "500 mg tablets"
    pub presentation: Option<String>,
    pub category: Option<String>,
    pub unit: Option<String>,
    pub purchase_price: Option<Money>,
    pub sale_price: Option<Money>,
    pub requires_prescription: bool,
    pub controlled: bool,
    pub minimum_stock: u32,
    pub registered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LotReceivedData {
    pub lot: Lot,
}

/// Why stock left the shelf.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DispenseReason {
    /// Prescribed during a completed visit.
    Prescription { appointment_id: AggregateId },
    /// Manual withdrawal: breakage, count correction, disposal of expired stock.
    Adjustment { note: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockDispensedData {
    /// Per-lot decrements in draw order.
    pub draws: Vec<LotDraw>,
    pub reason: DispenseReason,
    pub dispensed_at: DateTime<Utc>,
}

impl StockDispensedData {
    pub fn total(&self) -> u32 {
        self.draws.iter().map(|d| d.quantity).sum()
    }

    pub fn drew_from(&self, lot_id: LotId) -> u32 {
        self.draws
            .iter()
            .filter(|d| d.lot_id == lot_id)
            .map(|d| d.quantity)
            .sum()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MedicationDeactivatedData {
    pub deactivated_at: DateTime<Utc>,
}

impl MedicationEvent {
    pub fn lot_received(lot: Lot) -> Self {
        MedicationEvent::LotReceived(LotReceivedData { lot })
    }

    pub fn stock_dispensed(
        draws: Vec<LotDraw>,
        reason: DispenseReason,
        dispensed_at: DateTime<Utc>,
    ) -> Self {
        MedicationEvent::StockDispensed(StockDispensedData {
            draws,
            reason,
            dispensed_at,
        })
    }

    pub fn medication_deactivated(deactivated_at: DateTime<Utc>) -> Self {
        MedicationEvent::MedicationDeactivated(MedicationDeactivatedData { deactivated_at })
    }
}
