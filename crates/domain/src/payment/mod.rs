//! Payment settlement: revenue split, partial payments, refunds and QR
//! payment instructions, with an append-only audit trail.

mod aggregate;
mod commands;
mod events;
mod history;
mod method;
mod qr;
mod sequence;
mod service;
mod split;

pub use aggregate::Payment;
pub use commands::{CreatePayment, DEFAULT_DESCRIPTION, Settlement};
pub use events::{
    PartialPaymentAddedData, PaymentCompletedData, PaymentCreatedData, PaymentEvent,
    PaymentFailedData, PaymentRefundedData, QrGeneratedData, SplitCalculatedData,
};
pub use history::{AuditStamp, HistoryAction, PaymentHistoryEntry};
pub use method::{PaymentMethod, PaymentState};
pub use qr::{QrInstruction, QrSettings};
pub use sequence::{CodeIssuedData, PaymentCodeSequence, SequenceEvent};
pub use service::PaymentService;
pub use split::{DEFAULT_COMPANY_SHARE, RevenueSplit};

use thiserror::Error;

use crate::error::ErrorKind;
use crate::money::Money;

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A partial payment that is not positive or exceeds what is owed.
    #[error("Insufficient balance: {requested} offered, {outstanding} outstanding")]
    InsufficientBalance { requested: Money, outstanding: Money },

    #[error("Cannot {action} payment in state {current_state}")]
    InvalidStateTransition {
        current_state: PaymentState,
        action: &'static str,
    },

    #[error("Payment does not exist")]
    NotCreated,

    #[error("Payment already created")]
    AlreadyCreated,

    #[error("QR encoding failed: {0}")]
    QrEncoding(String),
}

impl PaymentError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PaymentError::Validation(_) | PaymentError::AlreadyCreated => ErrorKind::Validation,
            PaymentError::InsufficientBalance { .. } => ErrorKind::InsufficientBalance,
            PaymentError::InvalidStateTransition { .. } => ErrorKind::InvalidStateTransition,
            PaymentError::NotCreated => ErrorKind::NotFound,
            PaymentError::QrEncoding(_) => ErrorKind::Infrastructure,
        }
    }
}
