//! Payment service: creation and single-payment commands.

use chrono::{DateTime, Utc};
use common::{ActorId, AggregateId};
use event_store::EventStore;

use crate::aggregate::Aggregate;
use crate::command::{CommandHandler, CommandResult, UnitOfWork};
use crate::error::DomainError;
use crate::money::Percentage;

use super::{CreatePayment, Payment, PaymentCodeSequence, PaymentHistoryEntry, QrSettings};

/// Settling and refunding touch the linked appointment and are run by the
/// clinic coordinator, which stages them next to the appointment events.
pub struct PaymentService<S: EventStore> {
    handler: CommandHandler<S, Payment>,
    sequences: CommandHandler<S, PaymentCodeSequence>,
    qr_settings: QrSettings,
}

impl<S: EventStore + Clone> PaymentService<S> {
    pub fn new(store: S, qr_settings: QrSettings) -> Self {
        Self {
            handler: CommandHandler::new(store.clone()),
            sequences: CommandHandler::new(store),
            qr_settings,
        }
    }
}

impl<S: EventStore> PaymentService<S> {
    pub fn handler(&self) -> &CommandHandler<S, Payment> {
        &self.handler
    }

    pub fn qr_settings(&self) -> &QrSettings {
        &self.qr_settings
    }

    /// Issues the day's next code and stages the payment's creation in
    /// `uow`. Nothing is written until the unit is committed.
    pub async fn stage_create(
        &self,
        uow: &mut UnitOfWork,
        cmd: &CreatePayment,
        now: DateTime<Utc>,
    ) -> Result<CommandResult<Payment>, DomainError> {
        let day = now.date_naive();
        let sequence_id = PaymentCodeSequence::id_for(day);
        let mut sequence = self.sequences.load(sequence_id).await?;
        let issued = sequence.issue(day, cmd.payment_id, now)?;
        uow.record(sequence_id, &mut sequence, issued)?;
        let code = PaymentCodeSequence::format_code(day, sequence.last());

        let mut payment = self.handler.load(cmd.payment_id).await?;
        let events = payment.create(cmd, code, &self.qr_settings, now)?;
        uow.record(cmd.payment_id, &mut payment, events.clone())?;

        let new_version = payment.version();
        Ok(CommandResult {
            aggregate: payment,
            events,
            new_version,
        })
    }

    /// Creates a payment in a single attempt. A concurrent creation on the
    /// same day surfaces as a conflict.
    #[tracing::instrument(skip(self, cmd), fields(payment_id = %cmd.payment_id, amount = %cmd.amount))]
    pub async fn create_payment(
        &self,
        cmd: CreatePayment,
    ) -> Result<CommandResult<Payment>, DomainError> {
        let mut uow = UnitOfWork::new();
        let result = self.stage_create(&mut uow, &cmd, Utc::now()).await?;
        uow.commit(self.handler.store()).await?;
        tracing::info!(code = %result.aggregate.code(), "payment created");
        Ok(result)
    }

    #[tracing::instrument(skip(self))]
    pub async fn fail(
        &self,
        payment_id: AggregateId,
        reason: Option<String>,
        actor: ActorId,
    ) -> Result<CommandResult<Payment>, DomainError> {
        let now = Utc::now();
        self.handler
            .execute_existing(payment_id, |payment| payment.mark_failed(reason, actor, now))
            .await
    }

    /// Replaces the QR instruction; `payload` overrides the standard one.
    #[tracing::instrument(skip(self, payload))]
    pub async fn regenerate_qr(
        &self,
        payment_id: AggregateId,
        payload: Option<String>,
        actor: ActorId,
    ) -> Result<CommandResult<Payment>, DomainError> {
        let now = Utc::now();
        self.handler
            .execute_existing(payment_id, |payment| {
                payment.generate_qr(payload, &self.qr_settings, actor, now)
            })
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn recalculate_split(
        &self,
        payment_id: AggregateId,
        company_share: Option<Percentage>,
        actor: ActorId,
    ) -> Result<CommandResult<Payment>, DomainError> {
        let now = Utc::now();
        self.handler
            .execute_existing(payment_id, |payment| {
                payment.recalculate_split(company_share, actor, now)
            })
            .await
    }

    pub async fn get_payment(&self, payment_id: AggregateId) -> Result<Option<Payment>, DomainError> {
        self.handler.load_existing(payment_id).await
    }

    /// Audit trail of a payment, oldest first.
    pub async fn list_history_for(
        &self,
        payment_id: AggregateId,
    ) -> Result<Vec<PaymentHistoryEntry>, DomainError> {
        let payment = self.handler.load_required(payment_id).await?;
        Ok(payment.history().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::ids::ClientId;
    use crate::money::Money;
    use crate::payment::{HistoryAction, PaymentMethod, PaymentState};
    use event_store::InMemoryEventStore;

    fn service() -> PaymentService<InMemoryEventStore> {
        PaymentService::new(InMemoryEventStore::new(), QrSettings::default())
    }

    fn cmd() -> CreatePayment {
        CreatePayment::new(Money::from_major(35), PaymentMethod::QrSimple, ClientId::new())
    }

    #[tokio::test]
    async fn codes_are_sequential_within_a_day() {
        let service = service();
        let today = Utc::now().format("%Y%m%d").to_string();

        let first = service.create_payment(cmd()).await.unwrap();
        let second = service.create_payment(cmd()).await.unwrap();

        assert_eq!(first.aggregate.code(), format!("PAG-{today}-0001"));
        assert_eq!(second.aggregate.code(), format!("PAG-{today}-0002"));
    }

    #[tokio::test]
    async fn history_is_listed_oldest_first() {
        let service = service();
        let created = service.create_payment(cmd()).await.unwrap();
        let id = created.aggregate.id().unwrap();

        service
            .fail(id, Some("expired QR".into()), ActorId::new("cashier-1"))
            .await
            .unwrap();

        let history = service.list_history_for(id).await.unwrap();
        let actions: Vec<_> = history.iter().map(|h| h.action).collect();
        assert_eq!(
            actions,
            vec![
                HistoryAction::Created,
                HistoryAction::SplitCalculated,
                HistoryAction::QrGenerated,
                HistoryAction::Failed,
            ]
        );
        assert_eq!(history[3].new_state, PaymentState::Failed);
    }

    #[tokio::test]
    async fn duplicate_id_is_rejected() {
        let service = service();
        let cmd = cmd();
        service.create_payment(cmd.clone()).await.unwrap();

        let err = service.create_payment(cmd).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn unknown_payment_history_is_not_found() {
        let err = service().list_history_for(AggregateId::new()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
