//! Workflows that touch more than one aggregate.

use std::collections::HashMap;
use std::future::Future;
use std::time::Instant;

use chrono::{DateTime, NaiveDate, Utc};
use common::{ActorId, AggregateId};
use domain::{
    Aggregate, Appointment, AppointmentService, AppointmentState, CommandHandler, CompletionRecord,
    CreatePayment, DispensationOutcome, DispenseReason, DomainError, InventoryError,
    InventoryService, Lot, Medication, Money, Payment, PaymentHistoryEntry, PaymentService,
    PaymentState, Percentage, Prescription, PrescriptionItem, Settlement, UnitOfWork,
};
use event_store::EventStore;

use crate::config::ClinicConfig;
use crate::error::{ClinicError, Result};

/// Clinical outcome of a visit before inventory is consulted.
#[derive(Debug, Clone)]
pub struct CompleteVisit {
    pub appointment_id: AggregateId,
    pub diagnosis: String,
    pub treatment: String,
    pub observations: Option<String>,
    pub prescriptions: Vec<PrescriptionItem>,
    pub follow_up_on: Option<NaiveDate>,
}

impl CompleteVisit {
    pub fn new(
        appointment_id: AggregateId,
        diagnosis: impl Into<String>,
        treatment: impl Into<String>,
    ) -> Self {
        Self {
            appointment_id,
            diagnosis: diagnosis.into(),
            treatment: treatment.into(),
            observations: None,
            prescriptions: Vec::new(),
            follow_up_on: None,
        }
    }

    pub fn with_observations(mut self, observations: impl Into<String>) -> Self {
        self.observations = Some(observations.into());
        self
    }

    pub fn prescribe(mut self, item: PrescriptionItem) -> Self {
        self.prescriptions.push(item);
        self
    }

    pub fn follow_up_on(mut self, date: NaiveDate) -> Self {
        self.follow_up_on = Some(date);
        self
    }
}

/// A completed visit and what happened to each prescription, in input order.
#[derive(Debug, Clone)]
pub struct VisitCompletion {
    pub appointment: Appointment,
    pub prescriptions: Vec<Prescription>,
}

impl VisitCompletion {
    pub fn skipped(&self) -> impl Iterator<Item = &Prescription> {
        self.prescriptions
            .iter()
            .filter(|p| !p.outcome.is_dispensed())
    }
}

/// Result of a refund request.
#[derive(Debug, Clone)]
pub enum RefundOutcome {
    Refunded(Payment),
    /// The payment was not completed; nothing was written.
    NotRefundable { state: PaymentState },
}

impl RefundOutcome {
    pub fn is_refunded(&self) -> bool {
        matches!(self, RefundOutcome::Refunded(_))
    }
}

/// Runs the clinic's cross-aggregate workflows.
///
/// Each workflow loads what it needs, decides, and writes every resulting
/// event in one commit. A commit that loses a race to another writer is
/// retried from the load, up to the configured number of attempts.
pub struct ClinicCoordinator<S: EventStore> {
    store: S,
    appointments: AppointmentService<S>,
    inventory: InventoryService<S>,
    payments: PaymentService<S>,
    command_retries: u32,
}

impl<S: EventStore + Clone> ClinicCoordinator<S> {
    pub fn new(store: S, config: &ClinicConfig) -> Self {
        Self {
            appointments: AppointmentService::new(store.clone()),
            inventory: InventoryService::new(store.clone()),
            payments: PaymentService::new(store.clone(), config.qr_settings()),
            store,
            command_retries: config.command_retries.max(1),
        }
    }
}

impl<S: EventStore> ClinicCoordinator<S> {
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn appointments(&self) -> &AppointmentService<S> {
        &self.appointments
    }

    pub fn inventory(&self) -> &InventoryService<S> {
        &self.inventory
    }

    pub fn payments(&self) -> &PaymentService<S> {
        &self.payments
    }

    fn appointment_handler(&self) -> &CommandHandler<S, Appointment> {
        self.appointments.handler()
    }

    fn medication_handler(&self) -> &CommandHandler<S, Medication> {
        self.inventory.handler()
    }

    fn payment_handler(&self) -> &CommandHandler<S, Payment> {
        self.payments.handler()
    }

    /// Completes a visit and dispenses its prescriptions.
    ///
    /// Prescriptions are drawn in input order against one working copy per
    /// medication, so two items of the same medication see each other's
    /// draws. An item the stock cannot cover is recorded as skipped and
    /// draws nothing; the visit completes regardless.
    #[tracing::instrument(skip(self, cmd), fields(appointment_id = %cmd.appointment_id))]
    pub async fn complete_visit(&self, cmd: CompleteVisit) -> Result<VisitCompletion> {
        let cmd = &cmd;
        let completion = self
            .with_retries("complete_visit", move || self.try_complete_visit(cmd))
            .await?;

        let skipped = completion.skipped().count();
        metrics::counter!("clinic_visits_completed_total").increment(1);
        tracing::info!(
            prescriptions = completion.prescriptions.len(),
            skipped,
            "visit completed"
        );
        Ok(completion)
    }

    async fn try_complete_visit(
        &self,
        cmd: &CompleteVisit,
    ) -> std::result::Result<VisitCompletion, DomainError> {
        let now = Utc::now();
        let appointment_id = cmd.appointment_id;
        let mut appointment = self
            .appointment_handler()
            .load_required(appointment_id)
            .await?;
        appointment.ensure_can_complete(&cmd.diagnosis, &cmd.treatment)?;

        if cmd.prescriptions.iter().any(|item| item.quantity == 0) {
            return Err(DomainError::Validation(
                "prescribed quantity must be greater than 0".to_string(),
            ));
        }

        let mut medications: HashMap<AggregateId, Medication> = HashMap::new();
        for item in &cmd.prescriptions {
            if medications.contains_key(&item.medication_id) {
                continue;
            }
            let medication = self
                .medication_handler()
                .load_required(item.medication_id)
                .await?;
            if !medication.is_active() {
                return Err(InventoryError::Inactive.into());
            }
            medications.insert(item.medication_id, medication);
        }

        let mut uow = UnitOfWork::new();
        let mut prescriptions = Vec::with_capacity(cmd.prescriptions.len());
        for item in &cmd.prescriptions {
            let medication = medications.get_mut(&item.medication_id).ok_or_else(|| {
                DomainError::NotFound {
                    aggregate_type: Medication::aggregate_type(),
                    aggregate_id: item.medication_id,
                }
            })?;
            let reason = DispenseReason::Prescription { appointment_id };
            let outcome = match medication.dispense(item.quantity, reason, now) {
                Ok(events) => {
                    uow.record(item.medication_id, medication, events)?;
                    DispensationOutcome::Dispensed
                }
                Err(InventoryError::InsufficientStock {
                    available,
                    requested,
                }) => {
                    tracing::warn!(
                        medication_id = %item.medication_id,
                        medication = medication.name(),
                        available,
                        requested,
                        "prescription skipped: insufficient stock"
                    );
                    metrics::counter!("clinic_prescriptions_skipped_total").increment(1);
                    DispensationOutcome::SkippedInsufficientStock {
                        available,
                        requested,
                    }
                }
                Err(other) => return Err(other.into()),
            };
            prescriptions.push(item.clone().into_prescription(outcome));
        }

        let record = CompletionRecord {
            diagnosis: cmd.diagnosis.clone(),
            treatment: cmd.treatment.clone(),
            observations: cmd.observations.clone(),
            prescriptions: prescriptions.clone(),
            follow_up_on: cmd.follow_up_on,
        };
        let events = appointment.complete(record, now)?;
        uow.record(appointment_id, &mut appointment, events)?;
        uow.commit(&self.store).await?;

        Ok(VisitCompletion {
            appointment,
            prescriptions,
        })
    }

    /// Creates a payment under the day's next code.
    ///
    /// A linked appointment must exist, and the payment is attributed to its
    /// professional.
    #[tracing::instrument(skip(self, cmd), fields(payment_id = %cmd.payment_id, amount = %cmd.amount))]
    pub async fn create_payment(&self, cmd: CreatePayment) -> Result<Payment> {
        let cmd = &cmd;
        let payment = self
            .with_retries("create_payment", move || self.try_create_payment(cmd))
            .await?;
        tracing::info!(code = payment.code(), method = payment.method_label(), "payment created");
        Ok(payment)
    }

    async fn try_create_payment(
        &self,
        cmd: &CreatePayment,
    ) -> std::result::Result<Payment, DomainError> {
        let now = Utc::now();
        let mut cmd = cmd.clone();
        if let Some(appointment_id) = cmd.appointment_id {
            let appointment = self
                .appointment_handler()
                .load_required(appointment_id)
                .await?;
            if let Some(professional_id) = appointment.professional_id() {
                cmd.professional_id = Some(professional_id);
            }
        }

        let mut uow = UnitOfWork::new();
        let result = self.payments.stage_create(&mut uow, &cmd, now).await?;
        uow.commit(&self.store).await?;
        Ok(result.aggregate)
    }

    /// Settles the whole balance and marks the linked appointment paid.
    #[tracing::instrument(skip(self, settlement))]
    pub async fn settle_payment(
        &self,
        payment_id: AggregateId,
        settlement: Settlement,
    ) -> Result<Payment> {
        let settlement = &settlement;
        let payment = self
            .with_retries("settle_payment", move || async move {
                let now = Utc::now();
                let mut payment = self.payment_handler().load_required(payment_id).await?;
                let events = payment.mark_completed(settlement.clone(), now)?;

                let mut uow = UnitOfWork::new();
                uow.record(payment_id, &mut payment, events)?;
                self.stage_appointment_paid(&mut uow, &payment, now).await?;
                uow.commit(&self.store).await?;
                Ok(payment)
            })
            .await?;

        metrics::counter!("clinic_payments_settled_total").increment(1);
        tracing::info!(code = payment.code(), "payment settled");
        Ok(payment)
    }

    /// Adds a partial payment. Reaching the total settles the payment and
    /// marks the linked appointment paid in the same commit.
    #[tracing::instrument(skip(self))]
    pub async fn add_partial_payment(
        &self,
        payment_id: AggregateId,
        amount: Money,
        actor: ActorId,
    ) -> Result<Payment> {
        let actor = &actor;
        let payment = self
            .with_retries("add_partial_payment", move || async move {
                let now = Utc::now();
                let mut payment = self.payment_handler().load_required(payment_id).await?;
                let events = payment.add_partial_payment(amount, actor.clone(), now)?;

                let mut uow = UnitOfWork::new();
                uow.record(payment_id, &mut payment, events)?;
                self.stage_appointment_paid(&mut uow, &payment, now).await?;
                uow.commit(&self.store).await?;
                Ok(payment)
            })
            .await?;

        if payment.state() == PaymentState::Completed {
            metrics::counter!("clinic_payments_settled_total").increment(1);
        }
        tracing::info!(
            code = payment.code(),
            amount_paid = %payment.amount_paid(),
            outstanding = %payment.outstanding(),
            "partial payment recorded"
        );
        Ok(payment)
    }

    /// Refunds a completed payment and clears the appointment's paid flag.
    ///
    /// A payment in any other state is left untouched and reported as
    /// [`RefundOutcome::NotRefundable`].
    #[tracing::instrument(skip(self))]
    pub async fn refund_payment(
        &self,
        payment_id: AggregateId,
        reason: Option<String>,
        processed_by: Option<ActorId>,
    ) -> Result<RefundOutcome> {
        let (reason, processed_by) = (&reason, &processed_by);
        let outcome = self
            .with_retries("refund_payment", move || async move {
                let now = Utc::now();
                let mut payment = self.payment_handler().load_required(payment_id).await?;
                if payment.state() != PaymentState::Completed {
                    return Ok(RefundOutcome::NotRefundable {
                        state: payment.state(),
                    });
                }
                let events = payment.refund(reason.clone(), processed_by.clone(), now)?;

                let mut uow = UnitOfWork::new();
                uow.record(payment_id, &mut payment, events)?;
                if let Some(appointment_id) = payment.appointment_id() {
                    let mut appointment = self
                        .appointment_handler()
                        .load_required(appointment_id)
                        .await?;
                    let reversed = appointment.reverse_payment(payment_id, now)?;
                    uow.record(appointment_id, &mut appointment, reversed)?;
                }
                uow.commit(&self.store).await?;
                Ok(RefundOutcome::Refunded(payment))
            })
            .await?;

        match &outcome {
            RefundOutcome::Refunded(payment) => {
                metrics::counter!("clinic_refunds_total").increment(1);
                tracing::info!(code = payment.code(), "payment refunded");
            }
            RefundOutcome::NotRefundable { state } => {
                tracing::info!(%state, "refund ignored: payment not completed");
            }
        }
        Ok(outcome)
    }

    #[tracing::instrument(skip(self))]
    pub async fn fail_payment(
        &self,
        payment_id: AggregateId,
        reason: Option<String>,
        actor: ActorId,
    ) -> Result<Payment> {
        let result = self
            .with_retries("fail_payment", move || {
                self.payments.fail(payment_id, reason.clone(), actor.clone())
            })
            .await?;
        Ok(result.aggregate)
    }

    #[tracing::instrument(skip(self, payload))]
    pub async fn regenerate_qr(
        &self,
        payment_id: AggregateId,
        payload: Option<String>,
        actor: ActorId,
    ) -> Result<Payment> {
        let result = self
            .with_retries("regenerate_qr", move || {
                self.payments
                    .regenerate_qr(payment_id, payload.clone(), actor.clone())
            })
            .await?;
        Ok(result.aggregate)
    }

    #[tracing::instrument(skip(self))]
    pub async fn recalculate_split(
        &self,
        payment_id: AggregateId,
        company_share: Option<Percentage>,
        actor: ActorId,
    ) -> Result<Payment> {
        let result = self
            .with_retries("recalculate_split", move || {
                self.payments
                    .recalculate_split(payment_id, company_share, actor.clone())
            })
            .await?;
        Ok(result.aggregate)
    }

    pub async fn get_appointment(&self, appointment_id: AggregateId) -> Result<Option<Appointment>> {
        Ok(self.appointments.get_appointment(appointment_id).await?)
    }

    pub async fn get_medication(&self, medication_id: AggregateId) -> Result<Option<Medication>> {
        Ok(self.inventory.get_medication(medication_id).await?)
    }

    pub async fn get_payment(&self, payment_id: AggregateId) -> Result<Option<Payment>> {
        Ok(self.payments.get_payment(payment_id).await?)
    }

    /// Lots of a medication in the order they would be drawn.
    pub async fn list_lots_for(&self, medication_id: AggregateId) -> Result<Vec<Lot>> {
        Ok(self.inventory.list_lots_for(medication_id).await?)
    }

    /// Audit trail of a payment, oldest first.
    pub async fn list_history_for(&self, payment_id: AggregateId) -> Result<Vec<PaymentHistoryEntry>> {
        Ok(self.payments.list_history_for(payment_id).await?)
    }

    /// Stages the paid flag (and confirmation of a pending visit) on the
    /// appointment linked to `payment`, if the payment is now completed.
    async fn stage_appointment_paid(
        &self,
        uow: &mut UnitOfWork,
        payment: &Payment,
        now: DateTime<Utc>,
    ) -> std::result::Result<(), DomainError> {
        if payment.state() != PaymentState::Completed {
            return Ok(());
        }
        let (Some(appointment_id), Some(payment_id), Some(method)) =
            (payment.appointment_id(), payment.id(), payment.method())
        else {
            return Ok(());
        };

        let mut appointment = self
            .appointment_handler()
            .load_required(appointment_id)
            .await?;
        let paid = appointment.record_payment(payment_id, method, now)?;
        uow.record(appointment_id, &mut appointment, paid)?;
        if appointment.state() == AppointmentState::Pending {
            let confirmed = appointment.confirm(now)?;
            uow.record(appointment_id, &mut appointment, confirmed)?;
        }
        Ok(())
    }

    /// Runs `attempt` until it succeeds, fails with something other than a
    /// write conflict, or runs out of attempts.
    async fn with_retries<T, F, Fut>(&self, workflow: &'static str, mut attempt: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, DomainError>>,
    {
        let started = Instant::now();
        let mut attempts = 0;
        let result = loop {
            attempts += 1;
            match attempt().await {
                Ok(value) => break Ok(value),
                Err(err) if err.is_conflict() => {
                    if attempts >= self.command_retries {
                        tracing::warn!(workflow, attempts, "giving up after write conflicts");
                        break Err(ClinicError::RetriesExhausted { workflow, attempts });
                    }
                    metrics::counter!("clinic_command_retries_total", "workflow" => workflow)
                        .increment(1);
                    tracing::debug!(workflow, attempts, error = %err, "write conflict, retrying");
                }
                Err(err) => break Err(ClinicError::from(err)),
            }
        };

        metrics::histogram!("clinic_workflow_duration_seconds", "workflow" => workflow)
            .record(started.elapsed().as_secs_f64());
        result
    }
}
