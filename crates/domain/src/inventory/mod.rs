//! Inventory ledger: medications and their expiry-dated lots.

mod aggregate;
mod commands;
mod events;
mod lot;
mod service;

pub use aggregate::{DEFAULT_MINIMUM_STOCK, Medication};
pub use commands::RegisterMedication;
pub use events::{
    DispenseReason, LotReceivedData, MedicationDeactivatedData, MedicationEvent,
    MedicationRegisteredData, StockDispensedData,
};
pub use lot::{Lot, LotDraw, LotIntake};
pub use service::InventoryService;

use thiserror::Error;

use crate::error::ErrorKind;

#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Nothing was drawn.
    #[error("Insufficient stock: {requested} requested, {available} available")]
    InsufficientStock { available: u32, requested: u32 },

    #[error("Medication is not registered")]
    NotRegistered,

    #[error("Medication already registered")]
    AlreadyRegistered,

    #[error("Medication is deactivated")]
    Inactive,
}

impl InventoryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            InventoryError::Validation(_) | InventoryError::AlreadyRegistered => {
                ErrorKind::Validation
            }
            InventoryError::InsufficientStock { .. } => ErrorKind::InsufficientStock,
            InventoryError::NotRegistered => ErrorKind::NotFound,
            InventoryError::Inactive => ErrorKind::InvalidStateTransition,
        }
    }
}
