//! Appointment service for single-appointment commands.

use chrono::{DateTime, Utc};
use common::AggregateId;
use event_store::EventStore;

use crate::command::{CommandHandler, CommandResult};
use crate::error::DomainError;
use crate::ids::ProfessionalId;

use super::{Appointment, ScheduleAppointment};

/// Lifecycle commands that touch only the appointment stream.
///
/// Completing a visit dispenses stock and is run by the clinic coordinator.
pub struct AppointmentService<S: EventStore> {
    handler: CommandHandler<S, Appointment>,
}

impl<S: EventStore> AppointmentService<S> {
    pub fn new(store: S) -> Self {
        Self {
            handler: CommandHandler::new(store),
        }
    }

    pub fn handler(&self) -> &CommandHandler<S, Appointment> {
        &self.handler
    }

    #[tracing::instrument(skip(self, cmd), fields(appointment_id = %cmd.appointment_id))]
    pub async fn schedule(
        &self,
        cmd: ScheduleAppointment,
    ) -> Result<CommandResult<Appointment>, DomainError> {
        let now = Utc::now();
        let result = self
            .handler
            .execute(cmd.appointment_id, |appointment| appointment.schedule(&cmd, now))
            .await?;
        tracing::info!(scheduled_at = %cmd.scheduled_at, "appointment scheduled");
        Ok(result)
    }

    #[tracing::instrument(skip(self))]
    pub async fn assign_professional(
        &self,
        appointment_id: AggregateId,
        professional_id: ProfessionalId,
    ) -> Result<CommandResult<Appointment>, DomainError> {
        let now = Utc::now();
        self.handler
            .execute_existing(appointment_id, |appointment| {
                appointment.assign_professional(professional_id, now)
            })
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn confirm(
        &self,
        appointment_id: AggregateId,
    ) -> Result<CommandResult<Appointment>, DomainError> {
        let now = Utc::now();
        self.handler
            .execute_existing(appointment_id, |appointment| appointment.confirm(now))
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn start_treatment(
        &self,
        appointment_id: AggregateId,
    ) -> Result<CommandResult<Appointment>, DomainError> {
        let now = Utc::now();
        self.handler
            .execute_existing(appointment_id, |appointment| appointment.start_treatment(now))
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn cancel(
        &self,
        appointment_id: AggregateId,
        reason: Option<String>,
    ) -> Result<CommandResult<Appointment>, DomainError> {
        let now = Utc::now();
        self.handler
            .execute_existing(appointment_id, |appointment| appointment.cancel(reason, now))
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn mark_no_show(
        &self,
        appointment_id: AggregateId,
    ) -> Result<CommandResult<Appointment>, DomainError> {
        let now = Utc::now();
        self.handler
            .execute_existing(appointment_id, |appointment| appointment.mark_no_show(now))
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn postpone(
        &self,
        appointment_id: AggregateId,
        reason: String,
        new_time: Option<DateTime<Utc>>,
    ) -> Result<CommandResult<Appointment>, DomainError> {
        let now = Utc::now();
        self.handler
            .execute_existing(appointment_id, |appointment| {
                appointment.postpone(reason, new_time, now)
            })
            .await
    }

    pub async fn get_appointment(
        &self,
        appointment_id: AggregateId,
    ) -> Result<Option<Appointment>, DomainError> {
        self.handler.load_existing(appointment_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::Aggregate;
    use crate::appointment::{AppointmentKind, AppointmentState};
    use crate::error::ErrorKind;
    use crate::ids::{ClientId, PatientId};
    use crate::money::Money;
    use event_store::InMemoryEventStore;

    fn cmd() -> ScheduleAppointment {
        ScheduleAppointment::new(
            PatientId::new(),
            ClientId::new(),
            AppointmentKind::Vaccination,
            "annual vaccines",
            Utc::now(),
            Money::from_major(20),
        )
    }

    #[tokio::test]
    async fn schedule_confirm_and_reload() {
        let service = AppointmentService::new(InMemoryEventStore::new());
        let cmd = cmd();
        let id = cmd.appointment_id;

        service.schedule(cmd).await.unwrap();
        service.confirm(id).await.unwrap();

        let appointment = service.get_appointment(id).await.unwrap().unwrap();
        assert_eq!(appointment.state(), AppointmentState::Confirmed);
        assert_eq!(appointment.version().as_i64(), 2);
    }

    #[tokio::test]
    async fn invalid_transition_is_reported_by_kind() {
        let service = AppointmentService::new(InMemoryEventStore::new());
        let cmd = cmd();
        let id = cmd.appointment_id;
        service.schedule(cmd).await.unwrap();
        service.cancel(id, None).await.unwrap();

        let err = service.start_treatment(id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidStateTransition);
    }

    #[tokio::test]
    async fn unknown_appointment_is_not_found() {
        let service = AppointmentService::new(InMemoryEventStore::new());
        let err = service.confirm(AggregateId::new()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(service.get_appointment(AggregateId::new()).await.unwrap().is_none());
    }
}
