//! Appointment commands.

use chrono::{DateTime, NaiveDate, Utc};
use common::AggregateId;
use serde::{Deserialize, Serialize};

use crate::ids::{ClientId, PatientId, ProfessionalId};
use crate::money::Money;

use super::Prescription;

/// Visit duration used when scheduling does not set one.
pub const DEFAULT_DURATION_MINUTES: u32 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentKind {
    Consultation,
    Emergency,
    Surgery,
    Vaccination,
    FollowUp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Low,
    #[default]
    Normal,
    High,
    Emergency,
}

/// Books a visit. The appointment starts `Pending`.
#[derive(Debug, Clone)]
pub struct ScheduleAppointment {
    pub appointment_id: AggregateId,
    pub patient_id: PatientId,
    pub client_id: ClientId,
    pub professional_id: Option<ProfessionalId>,
    pub kind: AppointmentKind,
    pub urgency: Urgency,
    pub reason: String,
    pub symptoms: Option<String>,
    pub scheduled_at: DateTime<Utc>,
    /// Defaults to 30 minutes.
    pub duration_minutes: Option<u32>,
    pub cost: Money,
}

impl ScheduleAppointment {
    pub fn new(
        patient_id: PatientId,
        client_id: ClientId,
        kind: AppointmentKind,
        reason: impl Into<String>,
        scheduled_at: DateTime<Utc>,
        cost: Money,
    ) -> Self {
        Self {
            appointment_id: AggregateId::new(),
            patient_id,
            client_id,
            professional_id: None,
            kind,
            urgency: Urgency::default(),
            reason: reason.into(),
            symptoms: None,
            scheduled_at,
            duration_minutes: None,
            cost,
        }
    }

    pub fn with_professional(mut self, professional_id: ProfessionalId) -> Self {
        self.professional_id = Some(professional_id);
        self
    }

    pub fn with_urgency(mut self, urgency: Urgency) -> Self {
        self.urgency = urgency;
        self
    }

    pub fn with_symptoms(mut self, symptoms: impl Into<String>) -> Self {
        self.symptoms = Some(symptoms.into());
        self
    }

    pub fn with_duration(mut self, minutes: u32) -> Self {
        self.duration_minutes = Some(minutes);
        self
    }
}

/// Clinical outcome of a visit, with each prescription's dispensation
/// already resolved against inventory.
#[derive(Debug, Clone)]
pub struct CompletionRecord {
    pub diagnosis: String,
    pub treatment: String,
    pub observations: Option<String>,
    pub prescriptions: Vec<Prescription>,
    pub follow_up_on: Option<NaiveDate>,
}
