//! Application layer of the clinic.
//!
//! [`ClinicCoordinator`] runs the workflows that span aggregates (visit
//! completion with dispensation, payment settlement and refunds that flip
//! the appointment's paid flag) and commits each one atomically.

pub mod config;
pub mod coordinator;
pub mod error;
pub mod report;
pub mod telemetry;

pub use config::{ClinicConfig, LogFormat};
pub use coordinator::{ClinicCoordinator, CompleteVisit, RefundOutcome, VisitCompletion};
pub use error::{ClinicError, Result};
pub use report::ClinicReport;
