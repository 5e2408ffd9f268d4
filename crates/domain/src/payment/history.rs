//! Payment audit trail.

use chrono::{DateTime, Utc};
use common::{ActorId, AggregateId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::money::Money;

use super::PaymentState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryAction {
    Created,
    SplitCalculated,
    QrGenerated,
    PartialPayment,
    Completed,
    Refunded,
    Failed,
}

impl HistoryAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryAction::Created => "created",
            HistoryAction::SplitCalculated => "split_calculated",
            HistoryAction::QrGenerated => "qr_generated",
            HistoryAction::PartialPayment => "partial_payment",
            HistoryAction::Completed => "completed",
            HistoryAction::Refunded => "refunded",
            HistoryAction::Failed => "failed",
        }
    }
}

/// Who made a change, when and how it reads in the audit trail.
///
/// Every payment event carries one; replaying the event turns it into a
/// [`PaymentHistoryEntry`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditStamp {
    pub entry_id: Uuid,
    pub actor: ActorId,
    pub description: String,
    pub recorded_at: DateTime<Utc>,
}

impl AuditStamp {
    pub fn new(actor: ActorId, description: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            entry_id: Uuid::new_v4(),
            actor,
            description: description.into(),
            recorded_at: at,
        }
    }
}

/// One immutable line of a payment's history.
///
/// Amounts are the amount paid so far, before and after the change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentHistoryEntry {
    pub id: Uuid,
    pub payment_id: AggregateId,
    pub action: HistoryAction,
    /// `None` for the creation entry.
    pub previous_state: Option<PaymentState>,
    pub new_state: PaymentState,
    pub previous_amount: Option<Money>,
    pub new_amount: Money,
    pub description: String,
    pub actor: ActorId,
    pub at: DateTime<Utc>,
}
