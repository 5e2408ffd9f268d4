//! Read models and projections for the clinic's query side.
//!
//! - [`Projection`] trait for processing events into read models
//! - [`ReadModel`] trait for query access to denormalized data
//! - [`ProjectionProcessor`] for feeding events from the store to projections
//! - Two views: inventory alerts and the payment ledger

pub mod error;
pub mod processor;
pub mod projection;
pub mod read_model;
pub mod views;

pub use error::{ProjectionError, Result};
pub use processor::ProjectionProcessor;
pub use projection::{Projection, ProjectionPosition};
pub use read_model::ReadModel;
pub use views::{
    ExpiryAlert, InventoryAlerts, InventoryAlertsView, MedicationStock, OutstandingBalance,
    PaymentLedgerView, ProfessionalRevenue,
};
