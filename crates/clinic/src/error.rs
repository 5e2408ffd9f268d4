//! Clinic application errors.

use domain::{DomainError, ErrorKind};
use event_store::EventStoreError;
use projections::ProjectionError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClinicError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Event store error: {0}")]
    EventStore(#[from] EventStoreError),

    #[error("Projection error: {0}")]
    Projection(#[from] ProjectionError),

    /// Every attempt lost a write race to another writer.
    #[error("{workflow} gave up after {attempts} conflicting attempts")]
    RetriesExhausted {
        workflow: &'static str,
        attempts: u32,
    },
}

impl ClinicError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClinicError::Domain(e) => e.kind(),
            ClinicError::EventStore(e) if e.is_conflict() => ErrorKind::Conflict,
            ClinicError::RetriesExhausted { .. } => ErrorKind::Conflict,
            ClinicError::EventStore(_) | ClinicError::Projection(_) => ErrorKind::Infrastructure,
        }
    }
}

pub type Result<T> = std::result::Result<T, ClinicError>;

#[cfg(test)]
mod tests {
    use super::*;
    use domain::InventoryError;

    #[test]
    fn kinds_pass_through_domain_errors() {
        let err = ClinicError::from(DomainError::from(InventoryError::InsufficientStock {
            available: 0,
            requested: 2,
        }));
        assert_eq!(err.kind(), ErrorKind::InsufficientStock);
    }

    #[test]
    fn exhausted_retries_are_conflicts() {
        let err = ClinicError::RetriesExhausted {
            workflow: "create_payment",
            attempts: 3,
        };
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(
            err.to_string(),
            "create_payment gave up after 3 conflicting attempts"
        );
    }
}
