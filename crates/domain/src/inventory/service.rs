//! Inventory service providing a simplified API for stock operations.

use chrono::Utc;
use common::AggregateId;
use event_store::EventStore;

use crate::command::{CommandHandler, CommandResult};
use crate::error::DomainError;

use super::{DispenseReason, Lot, LotIntake, Medication, RegisterMedication};

/// Single-medication stock operations.
///
/// Dispensing as part of a visit goes through the clinic coordinator instead,
/// so that it commits together with the appointment.
pub struct InventoryService<S: EventStore> {
    handler: CommandHandler<S, Medication>,
}

impl<S: EventStore> InventoryService<S> {
    pub fn new(store: S) -> Self {
        Self {
            handler: CommandHandler::new(store),
        }
    }

    pub fn handler(&self) -> &CommandHandler<S, Medication> {
        &self.handler
    }

    #[tracing::instrument(skip(self, cmd), fields(medication_id = %cmd.medication_id, name = %cmd.name))]
    pub async fn register_medication(
        &self,
        cmd: RegisterMedication,
    ) -> Result<CommandResult<Medication>, DomainError> {
        let now = Utc::now();
        self.handler
            .execute(cmd.medication_id, |medication| medication.register(&cmd, now))
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn add_stock(
        &self,
        medication_id: AggregateId,
        intake: LotIntake,
    ) -> Result<CommandResult<Medication>, DomainError> {
        let now = Utc::now();
        let result = self
            .handler
            .execute_existing(medication_id, |medication| medication.add_stock(&intake, now))
            .await?;
        tracing::info!(stock = result.aggregate.stock(), "lot received");
        Ok(result)
    }

    /// Dispenses outside a visit. Insufficient stock is an error here.
    #[tracing::instrument(skip(self))]
    pub async fn dispense(
        &self,
        medication_id: AggregateId,
        quantity: u32,
        reason: DispenseReason,
    ) -> Result<CommandResult<Medication>, DomainError> {
        let now = Utc::now();
        self.handler
            .execute_existing(medication_id, |medication| {
                medication.dispense(quantity, reason, now)
            })
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn withdraw(
        &self,
        medication_id: AggregateId,
        quantity: u32,
        note: String,
    ) -> Result<CommandResult<Medication>, DomainError> {
        let now = Utc::now();
        self.handler
            .execute_existing(medication_id, |medication| {
                medication.withdraw(quantity, note, now)
            })
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn deactivate(
        &self,
        medication_id: AggregateId,
    ) -> Result<CommandResult<Medication>, DomainError> {
        let now = Utc::now();
        self.handler
            .execute_existing(medication_id, |medication| medication.deactivate(now))
            .await
    }

    pub async fn get_medication(
        &self,
        medication_id: AggregateId,
    ) -> Result<Option<Medication>, DomainError> {
        self.handler.load_existing(medication_id).await
    }

    /// Lots of a medication in draw order, emptied lots included.
    pub async fn list_lots_for(&self, medication_id: AggregateId) -> Result<Vec<Lot>, DomainError> {
        let medication = self.handler.load_required(medication_id).await?;
        Ok(medication
            .lots_in_draw_order()
            .into_iter()
            .cloned()
            .collect())
    }
}
