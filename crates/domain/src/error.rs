//! Domain error types.

use common::AggregateId;
use event_store::EventStoreError;
use thiserror::Error;

use crate::appointment::AppointmentError;
use crate::inventory::InventoryError;
use crate::payment::PaymentError;

/// Coarse classification of a failure, for callers that only need to pick
/// a message or status without matching every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    InsufficientStock,
    InsufficientBalance,
    InvalidStateTransition,
    NotFound,
    /// Another writer changed a stream first; the operation can be retried.
    Conflict,
    /// Storage or serialization failure.
    Infrastructure,
}

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Appointment error: {0}")]
    Appointment(#[from] AppointmentError),

    #[error("Inventory error: {0}")]
    Inventory(#[from] InventoryError),

    #[error("Payment error: {0}")]
    Payment(#[from] PaymentError),

    /// Input rejected before any aggregate was consulted.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{aggregate_type} not found: {aggregate_id}")]
    NotFound {
        aggregate_type: &'static str,
        aggregate_id: AggregateId,
    },

    #[error("Event store error: {0}")]
    EventStore(#[from] EventStoreError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DomainError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DomainError::Appointment(e) => e.kind(),
            DomainError::Inventory(e) => e.kind(),
            DomainError::Payment(e) => e.kind(),
            DomainError::Validation(_) => ErrorKind::Validation,
            DomainError::NotFound { .. } => ErrorKind::NotFound,
            DomainError::EventStore(e) if e.is_conflict() => ErrorKind::Conflict,
            DomainError::EventStore(_) | DomainError::Serialization(_) => {
                ErrorKind::Infrastructure
            }
        }
    }

    pub fn is_conflict(&self) -> bool {
        self.kind() == ErrorKind::Conflict
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use event_store::Version;

    #[test]
    fn kind_of_store_errors() {
        let conflict = DomainError::from(EventStoreError::ConcurrencyConflict {
            aggregate_id: AggregateId::new(),
            expected: Version::initial(),
            actual: Version::first(),
        });
        assert_eq!(conflict.kind(), ErrorKind::Conflict);
        assert!(conflict.is_conflict());

        let invalid = DomainError::from(EventStoreError::InvalidCommit("empty".into()));
        assert_eq!(invalid.kind(), ErrorKind::Infrastructure);
    }

    #[test]
    fn not_found_message_names_the_aggregate() {
        let id = AggregateId::new();
        let err = DomainError::NotFound {
            aggregate_type: "Medication",
            aggregate_id: id,
        };
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.to_string(), format!("Medication not found: {id}"));
    }
}
