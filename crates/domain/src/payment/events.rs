//! Payment domain events.

use chrono::{DateTime, Utc};
use common::{ActorId, AggregateId};
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;
use crate::ids::{ClientId, ProfessionalId};
use crate::money::Money;

use super::{AuditStamp, HistoryAction, PaymentMethod, QrInstruction, RevenueSplit, Settlement};

/// Every variant carries an [`AuditStamp`] and becomes one history entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum PaymentEvent {
    PaymentCreated(PaymentCreatedData),
    SplitCalculated(SplitCalculatedData),
    QrGenerated(QrGeneratedData),
    PartialPaymentAdded(PartialPaymentAddedData),
    PaymentCompleted(PaymentCompletedData),
    PaymentFailed(PaymentFailedData),
    PaymentRefunded(PaymentRefundedData),
}

impl DomainEvent for PaymentEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PaymentEvent::PaymentCreated(_) => "PaymentCreated",
            PaymentEvent::SplitCalculated(_) => "SplitCalculated",
            PaymentEvent::QrGenerated(_) => "QrGenerated",
            PaymentEvent::PartialPaymentAdded(_) => "PartialPaymentAdded",
            PaymentEvent::PaymentCompleted(_) => "PaymentCompleted",
            PaymentEvent::PaymentFailed(_) => "PaymentFailed",
            PaymentEvent::PaymentRefunded(_) => "PaymentRefunded",
        }
    }
}

impl PaymentEvent {
    pub fn audit(&self) -> &AuditStamp {
        match self {
            PaymentEvent::PaymentCreated(data) => &data.audit,
            PaymentEvent::SplitCalculated(data) => &data.audit,
            PaymentEvent::QrGenerated(data) => &data.audit,
            PaymentEvent::PartialPaymentAdded(data) => &data.audit,
            PaymentEvent::PaymentCompleted(data) => &data.audit,
            PaymentEvent::PaymentFailed(data) => &data.audit,
            PaymentEvent::PaymentRefunded(data) => &data.audit,
        }
    }

    pub fn history_action(&self) -> HistoryAction {
        match self {
            PaymentEvent::PaymentCreated(_) => HistoryAction::Created,
            PaymentEvent::SplitCalculated(_) => HistoryAction::SplitCalculated,
            PaymentEvent::QrGenerated(_) => HistoryAction::QrGenerated,
            PaymentEvent::PartialPaymentAdded(_) => HistoryAction::PartialPayment,
            PaymentEvent::PaymentCompleted(_) => HistoryAction::Completed,
            PaymentEvent::PaymentFailed(_) => HistoryAction::Failed,
            PaymentEvent::PaymentRefunded(_) => HistoryAction::Refunded,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentCreatedData {
    pub payment_id: AggregateId,
    pub code: String,
    pub amount: Money,
    pub method: PaymentMethod,
    pub payer_id: ClientId,
    pub appointment_id: Option<AggregateId>,
    pub professional_id: Option<ProfessionalId>,
    pub description: String,
    pub due_at: Option<DateTime<Utc>>,
    pub requires_invoice: bool,
    pub fiscal_id: Option<String>,
    pub legal_name: Option<String>,
    pub audit: AuditStamp,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitCalculatedData {
    pub split: RevenueSplit,
    pub audit: AuditStamp,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QrGeneratedData {
    pub qr: QrInstruction,
    pub audit: AuditStamp,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartialPaymentAddedData {
    pub amount: Money,
    /// Reaching the total completes the payment.
    pub amount_paid_after: Money,
    pub audit: AuditStamp,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentCompletedData {
    pub settlement: Settlement,
    pub audit: AuditStamp,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentFailedData {
    pub reason: Option<String>,
    pub audit: AuditStamp,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRefundedData {
    pub reason: Option<String>,
    pub processed_by: Option<ActorId>,
    pub audit: AuditStamp,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_tagged_with_audit() {
        let event = PaymentEvent::PaymentFailed(PaymentFailedData {
            reason: Some("card declined".to_string()),
            audit: AuditStamp::new(ActorId::new("cashier-1"), "Payment failed", Utc::now()),
        });

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "PaymentFailed");
        assert_eq!(json["data"]["audit"]["actor"], "cashier-1");

        let back: PaymentEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back.history_action(), HistoryAction::Failed);
        assert_eq!(back.audit().description, "Payment failed");
    }
}
