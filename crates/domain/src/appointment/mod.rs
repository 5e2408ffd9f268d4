//! Appointment lifecycle: scheduling, treatment and visit records.

mod aggregate;
mod commands;
mod events;
mod prescription;
mod service;
mod state;

pub use aggregate::Appointment;
pub use commands::{
    AppointmentKind, CompletionRecord, DEFAULT_DURATION_MINUTES, ScheduleAppointment, Urgency,
};
pub use events::{
    AppointmentCancelledData, AppointmentConfirmedData, AppointmentEvent, AppointmentNoShowData,
    AppointmentPostponedData, AppointmentScheduledData, PaymentRecordedData, PaymentReversedData,
    ProfessionalAssignedData, TreatmentStartedData, VisitCompletedData,
};
pub use prescription::{DispensationOutcome, Prescription, PrescriptionItem};
pub use service::AppointmentService;
pub use state::{AppointmentState, AppointmentTransition};

use thiserror::Error;

use crate::error::ErrorKind;

#[derive(Debug, Error)]
pub enum AppointmentError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Cannot {action} appointment in state {current_state}")]
    InvalidStateTransition {
        current_state: AppointmentState,
        action: &'static str,
    },

    #[error("Appointment is not scheduled")]
    NotScheduled,

    #[error("Appointment already scheduled")]
    AlreadyScheduled,
}

impl AppointmentError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppointmentError::Validation(_) | AppointmentError::AlreadyScheduled => {
                ErrorKind::Validation
            }
            AppointmentError::InvalidStateTransition { .. } => ErrorKind::InvalidStateTransition,
            AppointmentError::NotScheduled => ErrorKind::NotFound,
        }
    }
}
