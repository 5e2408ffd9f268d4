//! Prescriptions written at visit completion.

use common::AggregateId;
use serde::{Deserialize, Serialize};

use crate::ids::PrescriptionId;

/// What happened when a prescription was dispensed against inventory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DispensationOutcome {
    Dispensed,
    /// Stock could not cover the quantity; nothing was drawn and the visit
    /// completed anyway.
    #[serde(rename = "skipped:insufficient_stock")]
    SkippedInsufficientStock { available: u32, requested: u32 },
}

impl DispensationOutcome {
    pub fn is_dispensed(&self) -> bool {
        matches!(self, DispensationOutcome::Dispensed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DispensationOutcome::Dispensed => "dispensed",
            DispensationOutcome::SkippedInsufficientStock { .. } => "skipped:insufficient_stock",
        }
    }
}

/// One prescribed medication as entered by the professional.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrescriptionItem {
    pub medication_id: AggregateId,
    pub quantity: u32,
    /// e.g. "1 tablet every 8 hours"
    pub dosage: Option<String>,
    /// e.g. "7 days"
    pub duration: Option<String>,
    pub instructions: Option<String>,
}

impl PrescriptionItem {
    pub fn new(medication_id: AggregateId, quantity: u32) -> Self {
        Self {
            medication_id,
            quantity,
            dosage: None,
            duration: None,
            instructions: None,
        }
    }

    pub fn with_dosage(mut self, dosage: impl Into<String>) -> Self {
        self.dosage = Some(dosage.into());
        self
    }

    pub fn with_duration(mut self, duration: impl Into<String>) -> Self {
        self.duration = Some(duration.into());
        self
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    pub fn into_prescription(self, outcome: DispensationOutcome) -> Prescription {
        Prescription {
            id: PrescriptionId::new(),
            medication_id: self.medication_id,
            quantity: self.quantity,
            dosage: self.dosage,
            duration: self.duration,
            instructions: self.instructions,
            outcome,
        }
    }
}

/// A prescription recorded on a completed appointment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prescription {
    pub id: PrescriptionId,
    pub medication_id: AggregateId,
    pub quantity: u32,
    pub dosage: Option<String>,
    pub duration: Option<String>,
    pub instructions: Option<String>,
    pub outcome: DispensationOutcome,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_labels() {
        assert_eq!(DispensationOutcome::Dispensed.as_str(), "dispensed");
        let skipped = DispensationOutcome::SkippedInsufficientStock {
            available: 0,
            requested: 2,
        };
        assert_eq!(skipped.as_str(), "skipped:insufficient_stock");
        assert!(!skipped.is_dispensed());

        let json = serde_json::to_value(skipped).unwrap();
        assert_eq!(json["status"], skipped.as_str());
        assert_eq!(json["requested"], 2);
    }

    #[test]
    fn persisted_status_reads_back() {
        let stored = serde_json::json!({
            "status": "skipped:insufficient_stock",
            "available": 1,
            "requested": 3,
        });
        let outcome: DispensationOutcome = serde_json::from_value(stored).unwrap();
        assert_eq!(
            outcome,
            DispensationOutcome::SkippedInsufficientStock {
                available: 1,
                requested: 3,
            }
        );
    }
}
