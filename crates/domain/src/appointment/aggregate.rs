//! Appointment aggregate implementation.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use common::AggregateId;
use event_store::Version;

use crate::aggregate::Aggregate;
use crate::ids::{ClientId, PatientId, ProfessionalId};
use crate::money::Money;
use crate::payment::PaymentMethod;

use super::{
    AppointmentError, AppointmentEvent, AppointmentKind, AppointmentState, AppointmentTransition,
    CompletionRecord, DEFAULT_DURATION_MINUTES, Prescription, ScheduleAppointment, Urgency,
    events::{
        AppointmentPostponedData, AppointmentScheduledData, PaymentRecordedData,
        VisitCompletedData,
    },
};

/// A scheduled visit and its clinical record.
#[derive(Debug, Clone, Default)]
pub struct Appointment {
    id: Option<AggregateId>,
    version: Version,

    patient_id: Option<PatientId>,
    client_id: Option<ClientId>,
    professional_id: Option<ProfessionalId>,
    kind: Option<AppointmentKind>,
    urgency: Urgency,
    reason: String,
    symptoms: Option<String>,
    scheduled_at: Option<DateTime<Utc>>,
    duration_minutes: u32,
    cost: Money,

    state: AppointmentState,

    diagnosis: Option<String>,
    treatment: Option<String>,
    observations: Option<String>,
    prescriptions: Vec<Prescription>,
    follow_up_on: Option<NaiveDate>,

    /// Set and cleared only through payment events.
    paid: bool,
    payment_id: Option<AggregateId>,
    payment_method: Option<PaymentMethod>,

    created_at: Option<DateTime<Utc>>,
    confirmed_at: Option<DateTime<Utc>>,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
    no_show_at: Option<DateTime<Utc>>,
    cancellation_reason: Option<String>,
    postponements: Vec<AppointmentPostponedData>,
}

impl Aggregate for Appointment {
    type Event = AppointmentEvent;
    type Error = AppointmentError;

    fn aggregate_type() -> &'static str {
        "Appointment"
    }

    fn id(&self) -> Option<AggregateId> {
        self.id
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            AppointmentEvent::AppointmentScheduled(data) => self.apply_scheduled(data),
            AppointmentEvent::ProfessionalAssigned(data) => {
                self.professional_id = Some(data.professional_id);
            }
            AppointmentEvent::AppointmentConfirmed(data) => {
                self.state = AppointmentState::Confirmed;
                self.confirmed_at = Some(data.confirmed_at);
            }
            AppointmentEvent::TreatmentStarted(data) => {
                self.state = AppointmentState::InProgress;
                self.started_at = Some(data.started_at);
            }
            AppointmentEvent::VisitCompleted(data) => self.apply_completed(data),
            AppointmentEvent::AppointmentCancelled(data) => {
                self.state = AppointmentState::Cancelled;
                self.cancelled_at = Some(data.cancelled_at);
                self.cancellation_reason = data.reason;
            }
            AppointmentEvent::AppointmentNoShow(data) => {
                self.state = AppointmentState::NoShow;
                self.no_show_at = Some(data.marked_at);
            }
            AppointmentEvent::AppointmentPostponed(data) => {
                self.state = AppointmentState::Pending;
                if let Some(new_time) = data.new_time {
                    self.scheduled_at = Some(new_time);
                }
                self.postponements.push(data);
            }
            AppointmentEvent::PaymentRecorded(data) => self.apply_payment_recorded(data),
            AppointmentEvent::PaymentReversed(_) => {
                self.paid = false;
                self.payment_id = None;
            }
        }
    }
}

// Query methods
impl Appointment {
    pub fn state(&self) -> AppointmentState {
        self.state
    }

    pub fn patient_id(&self) -> Option<PatientId> {
        self.patient_id
    }

    pub fn client_id(&self) -> Option<ClientId> {
        self.client_id
    }

    pub fn professional_id(&self) -> Option<ProfessionalId> {
        self.professional_id
    }

    pub fn kind(&self) -> Option<AppointmentKind> {
        self.kind
    }

    pub fn urgency(&self) -> Urgency {
        self.urgency
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn symptoms(&self) -> Option<&str> {
        self.symptoms.as_deref()
    }

    pub fn scheduled_at(&self) -> Option<DateTime<Utc>> {
        self.scheduled_at
    }

    pub fn duration_minutes(&self) -> u32 {
        self.duration_minutes
    }

    pub fn estimated_end(&self) -> Option<DateTime<Utc>> {
        self.scheduled_at
            .map(|at| at + Duration::minutes(i64::from(self.duration_minutes)))
    }

    pub fn cost(&self) -> Money {
        self.cost
    }

    pub fn diagnosis(&self) -> Option<&str> {
        self.diagnosis.as_deref()
    }

    pub fn treatment(&self) -> Option<&str> {
        self.treatment.as_deref()
    }

    pub fn observations(&self) -> Option<&str> {
        self.observations.as_deref()
    }

    pub fn prescriptions(&self) -> &[Prescription] {
        &self.prescriptions
    }

    pub fn follow_up_on(&self) -> Option<NaiveDate> {
        self.follow_up_on
    }

    pub fn is_paid(&self) -> bool {
        self.paid
    }

    pub fn payment_id(&self) -> Option<AggregateId> {
        self.payment_id
    }

    pub fn payment_method(&self) -> Option<PaymentMethod> {
        self.payment_method
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn confirmed_at(&self) -> Option<DateTime<Utc>> {
        self.confirmed_at
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    pub fn cancelled_at(&self) -> Option<DateTime<Utc>> {
        self.cancelled_at
    }

    pub fn no_show_at(&self) -> Option<DateTime<Utc>> {
        self.no_show_at
    }

    pub fn cancellation_reason(&self) -> Option<&str> {
        self.cancellation_reason.as_deref()
    }

    /// Postponements, oldest first.
    pub fn postponements(&self) -> &[AppointmentPostponedData] {
        &self.postponements
    }

    /// Still pending after its scheduled time.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.state == AppointmentState::Pending && self.scheduled_at.is_some_and(|at| now > at)
    }

    /// Whole minutes past the scheduled time, if overdue.
    pub fn minutes_waiting(&self, now: DateTime<Utc>) -> Option<i64> {
        if !self.is_overdue(now) {
            return None;
        }
        self.scheduled_at.map(|at| (now - at).num_minutes())
    }

    /// Minutes between treatment start and end; `None` unless both were stamped.
    pub fn actual_duration_minutes(&self) -> Option<i64> {
        match (self.started_at, self.ended_at) {
            (Some(start), Some(end)) => Some((end - start).num_minutes()),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}

// Command methods (return events)
impl Appointment {
    pub fn schedule(
        &self,
        cmd: &ScheduleAppointment,
        now: DateTime<Utc>,
    ) -> Result<Vec<AppointmentEvent>, AppointmentError> {
        if self.id.is_some() {
            return Err(AppointmentError::AlreadyScheduled);
        }
        if cmd.reason.trim().is_empty() {
            return Err(AppointmentError::Validation(
                "a visit reason is required".to_string(),
            ));
        }
        let duration_minutes = cmd.duration_minutes.unwrap_or(DEFAULT_DURATION_MINUTES);
        if duration_minutes == 0 {
            return Err(AppointmentError::Validation(
                "duration must be greater than 0".to_string(),
            ));
        }
        if cmd.cost.is_negative() {
            return Err(AppointmentError::Validation(
                "cost cannot be negative".to_string(),
            ));
        }

        Ok(vec![AppointmentEvent::AppointmentScheduled(
            AppointmentScheduledData {
                appointment_id: cmd.appointment_id,
                patient_id: cmd.patient_id,
                client_id: cmd.client_id,
                professional_id: cmd.professional_id,
                kind: cmd.kind,
                urgency: cmd.urgency,
                reason: cmd.reason.trim().to_string(),
                symptoms: cmd.symptoms.clone(),
                scheduled_at: cmd.scheduled_at,
                duration_minutes,
                cost: cmd.cost,
                created_at: now,
            },
        )])
    }

    pub fn assign_professional(
        &self,
        professional_id: ProfessionalId,
        now: DateTime<Utc>,
    ) -> Result<Vec<AppointmentEvent>, AppointmentError> {
        self.ensure_scheduled()?;
        if !self.state.is_open() {
            return Err(AppointmentError::InvalidStateTransition {
                current_state: self.state,
                action: "assign professional",
            });
        }
        if self.professional_id == Some(professional_id) {
            return Ok(vec![]);
        }
        Ok(vec![AppointmentEvent::professional_assigned(
            professional_id,
            now,
        )])
    }

    pub fn confirm(&self, now: DateTime<Utc>) -> Result<Vec<AppointmentEvent>, AppointmentError> {
        self.guard(AppointmentTransition::Confirm)?;
        Ok(vec![AppointmentEvent::confirmed(now)])
    }

    pub fn start_treatment(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<AppointmentEvent>, AppointmentError> {
        self.guard(AppointmentTransition::StartTreatment)?;
        Ok(vec![AppointmentEvent::treatment_started(now)])
    }

    /// Checks that the visit can be completed with these notes, before any
    /// prescription is dispensed.
    pub fn ensure_can_complete(
        &self,
        diagnosis: &str,
        treatment: &str,
    ) -> Result<(), AppointmentError> {
        self.guard(AppointmentTransition::Complete)?;
        if diagnosis.trim().is_empty() {
            return Err(AppointmentError::Validation(
                "diagnosis is required".to_string(),
            ));
        }
        if treatment.trim().is_empty() {
            return Err(AppointmentError::Validation(
                "treatment is required".to_string(),
            ));
        }
        Ok(())
    }

    /// Records the visit outcome. Skipped prescriptions do not block
    /// completion.
    pub fn complete(
        &self,
        record: CompletionRecord,
        now: DateTime<Utc>,
    ) -> Result<Vec<AppointmentEvent>, AppointmentError> {
        self.ensure_can_complete(&record.diagnosis, &record.treatment)?;
        Ok(vec![AppointmentEvent::VisitCompleted(VisitCompletedData {
            diagnosis: record.diagnosis,
            treatment: record.treatment,
            observations: record.observations,
            prescriptions: record.prescriptions,
            follow_up_on: record.follow_up_on,
            completed_at: now,
        })])
    }

    pub fn cancel(
        &self,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Vec<AppointmentEvent>, AppointmentError> {
        self.guard(AppointmentTransition::Cancel)?;
        Ok(vec![AppointmentEvent::cancelled(reason, now)])
    }

    pub fn mark_no_show(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<AppointmentEvent>, AppointmentError> {
        self.guard(AppointmentTransition::MarkNoShow)?;
        Ok(vec![AppointmentEvent::no_show(now)])
    }

    /// Sends the appointment back to `Pending`, optionally at a new time.
    pub fn postpone(
        &self,
        reason: impl Into<String>,
        new_time: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<Vec<AppointmentEvent>, AppointmentError> {
        self.guard(AppointmentTransition::Postpone)?;
        let reason = reason.into();
        if reason.trim().is_empty() {
            return Err(AppointmentError::Validation(
                "a postponement reason is required".to_string(),
            ));
        }
        let previous_time = self.scheduled_at.unwrap_or(now);
        Ok(vec![AppointmentEvent::AppointmentPostponed(
            AppointmentPostponedData {
                reason,
                previous_time,
                new_time,
                postponed_at: now,
            },
        )])
    }

    /// Marks the visit paid by `payment_id`. Repeating it for the same
    /// payment changes nothing.
    pub fn record_payment(
        &self,
        payment_id: AggregateId,
        method: PaymentMethod,
        now: DateTime<Utc>,
    ) -> Result<Vec<AppointmentEvent>, AppointmentError> {
        self.ensure_scheduled()?;
        if self.paid && self.payment_id == Some(payment_id) {
            return Ok(vec![]);
        }
        Ok(vec![AppointmentEvent::payment_recorded(
            payment_id, method, now,
        )])
    }

    /// Clears the paid flag if it was set by `payment_id`.
    pub fn reverse_payment(
        &self,
        payment_id: AggregateId,
        now: DateTime<Utc>,
    ) -> Result<Vec<AppointmentEvent>, AppointmentError> {
        self.ensure_scheduled()?;
        if !self.paid || self.payment_id != Some(payment_id) {
            return Ok(vec![]);
        }
        Ok(vec![AppointmentEvent::payment_reversed(payment_id, now)])
    }

    fn ensure_scheduled(&self) -> Result<(), AppointmentError> {
        if self.id.is_none() {
            return Err(AppointmentError::NotScheduled);
        }
        Ok(())
    }

    fn guard(&self, transition: AppointmentTransition) -> Result<AppointmentState, AppointmentError> {
        self.ensure_scheduled()?;
        self.state
            .transition(transition)
            .ok_or(AppointmentError::InvalidStateTransition {
                current_state: self.state,
                action: transition.as_str(),
            })
    }
}

// Event application
impl Appointment {
    fn apply_scheduled(&mut self, data: AppointmentScheduledData) {
        self.id = Some(data.appointment_id);
        self.patient_id = Some(data.patient_id);
        self.client_id = Some(data.client_id);
        self.professional_id = data.professional_id;
        self.kind = Some(data.kind);
        self.urgency = data.urgency;
        self.reason = data.reason;
        self.symptoms = data.symptoms;
        self.scheduled_at = Some(data.scheduled_at);
        self.duration_minutes = data.duration_minutes;
        self.cost = data.cost;
        self.state = AppointmentState::Pending;
        self.created_at = Some(data.created_at);
    }

    fn apply_completed(&mut self, data: VisitCompletedData) {
        self.state = AppointmentState::Completed;
        self.diagnosis = Some(data.diagnosis);
        self.treatment = Some(data.treatment);
        self.observations = data.observations;
        self.prescriptions = data.prescriptions;
        self.follow_up_on = data.follow_up_on;
        self.ended_at = Some(data.completed_at);
    }

    fn apply_payment_recorded(&mut self, data: PaymentRecordedData) {
        self.paid = true;
        self.payment_id = Some(data.payment_id);
        self.payment_method = Some(data.method);
    }
}
