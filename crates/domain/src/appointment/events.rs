//! Appointment domain events.

use chrono::{DateTime, NaiveDate, Utc};
use common::AggregateId;
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;
use crate::ids::{ClientId, PatientId, ProfessionalId};
use crate::money::Money;
use crate::payment::PaymentMethod;

use super::{AppointmentKind, Prescription, Urgency};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum AppointmentEvent {
    AppointmentScheduled(AppointmentScheduledData),
    ProfessionalAssigned(ProfessionalAssignedData),
    AppointmentConfirmed(AppointmentConfirmedData),
    TreatmentStarted(TreatmentStartedData),
    VisitCompleted(VisitCompletedData),
    AppointmentCancelled(AppointmentCancelledData),
    AppointmentNoShow(AppointmentNoShowData),
    AppointmentPostponed(AppointmentPostponedData),
    /// A linked payment reached `completed`.
    PaymentRecorded(PaymentRecordedData),
    /// The linked payment was refunded.
    PaymentReversed(PaymentReversedData),
}

impl DomainEvent for AppointmentEvent {
    fn event_type(&self) -> &'static str {
        match self {
            AppointmentEvent::AppointmentScheduled(_) => "AppointmentScheduled",
            AppointmentEvent::ProfessionalAssigned(_) => "ProfessionalAssigned",
            AppointmentEvent::AppointmentConfirmed(_) => "AppointmentConfirmed",
            AppointmentEvent::TreatmentStarted(_) => "TreatmentStarted",
            AppointmentEvent::VisitCompleted(_) => "VisitCompleted",
            AppointmentEvent::AppointmentCancelled(_) => "AppointmentCancelled",
            AppointmentEvent::AppointmentNoShow(_) => "AppointmentNoShow",
            AppointmentEvent::AppointmentPostponed(_) => "AppointmentPostponed",
            AppointmentEvent::PaymentRecorded(_) => "PaymentRecorded",
            AppointmentEvent::PaymentReversed(_) => "PaymentReversed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentScheduledData {
    pub appointment_id: AggregateId,
    pub patient_id: PatientId,
    pub client_id: ClientId,
    pub professional_id: Option<ProfessionalId>,
    pub kind: AppointmentKind,
    pub urgency: Urgency,
    pub reason: String,
    pub symptoms: Option<String>,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: u32,
    pub cost: Money,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfessionalAssignedData {
    pub professional_id: ProfessionalId,
    pub assigned_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentConfirmedData {
    pub confirmed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreatmentStartedData {
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisitCompletedData {
    pub diagnosis: String,
    pub treatment: String,
    pub observations: Option<String>,
    pub prescriptions: Vec<Prescription>,
    pub follow_up_on: Option<NaiveDate>,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentCancelledData {
    pub reason: Option<String>,
    pub cancelled_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentNoShowData {
    pub marked_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppointmentPostponedData {
    pub reason: String,
    pub previous_time: DateTime<Utc>,
    /// `None` keeps the current time slot.
    pub new_time: Option<DateTime<Utc>>,
    pub postponed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRecordedData {
    pub payment_id: AggregateId,
    pub method: PaymentMethod,
    pub paid_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentReversedData {
    pub payment_id: AggregateId,
    pub reversed_at: DateTime<Utc>,
}

// Convenience constructors
impl AppointmentEvent {
    pub fn professional_assigned(professional_id: ProfessionalId, at: DateTime<Utc>) -> Self {
        AppointmentEvent::ProfessionalAssigned(ProfessionalAssignedData {
            professional_id,
            assigned_at: at,
        })
    }

    pub fn confirmed(at: DateTime<Utc>) -> Self {
        AppointmentEvent::AppointmentConfirmed(AppointmentConfirmedData { confirmed_at: at })
    }

    pub fn treatment_started(at: DateTime<Utc>) -> Self {
        AppointmentEvent::TreatmentStarted(TreatmentStartedData { started_at: at })
    }

    pub fn cancelled(reason: Option<String>, at: DateTime<Utc>) -> Self {
        AppointmentEvent::AppointmentCancelled(AppointmentCancelledData {
            reason,
            cancelled_at: at,
        })
    }

    pub fn no_show(at: DateTime<Utc>) -> Self {
        AppointmentEvent::AppointmentNoShow(AppointmentNoShowData { marked_at: at })
    }

    pub fn payment_recorded(payment_id: AggregateId, method: PaymentMethod, at: DateTime<Utc>) -> Self {
        AppointmentEvent::PaymentRecorded(PaymentRecordedData {
            payment_id,
            method,
            paid_at: at,
        })
    }

    pub fn payment_reversed(payment_id: AggregateId, at: DateTime<Utc>) -> Self {
        AppointmentEvent::PaymentReversed(PaymentReversedData {
            payment_id,
            reversed_at: at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_types_match_variant_names() {
        let now = Utc::now();
        assert_eq!(AppointmentEvent::confirmed(now).event_type(), "AppointmentConfirmed");
        assert_eq!(AppointmentEvent::no_show(now).event_type(), "AppointmentNoShow");
        assert_eq!(
            AppointmentEvent::payment_reversed(AggregateId::new(), now).event_type(),
            "PaymentReversed"
        );
    }

    #[test]
    fn serializes_tagged() {
        let event = AppointmentEvent::cancelled(Some("owner travelling".into()), Utc::now());
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "AppointmentCancelled");
        assert_eq!(json["data"]["reason"], "owner travelling");

        let back: AppointmentEvent = serde_json::from_value(json).unwrap();
        assert!(matches!(back, AppointmentEvent::AppointmentCancelled(_)));
    }
}
