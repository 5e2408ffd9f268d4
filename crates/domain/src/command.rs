//! Command handling infrastructure.

use std::marker::PhantomData;

use common::AggregateId;
use event_store::{Commit, EventEnvelope, EventStore, StreamAppend, Version};
use uuid::Uuid;

use crate::aggregate::{Aggregate, DomainEvent};
use crate::error::DomainError;

/// Result of command execution.
#[derive(Debug)]
pub struct CommandResult<A: Aggregate> {
    /// The aggregate after applying the new events.
    pub aggregate: A,

    /// The events that were generated and persisted.
    pub events: Vec<A::Event>,

    pub new_version: Version,
}

/// Events staged against one or more aggregates, committed atomically.
///
/// Recording events applies them to the caller's working copy right away, so
/// a later decision in the same unit sees earlier ones (two prescriptions of
/// the same medication draw from the already-depleted lots).
#[derive(Debug, Default)]
pub struct UnitOfWork {
    commit: Commit,
}

impl UnitOfWork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn correlation_id(&self) -> Uuid {
        self.commit.correlation_id
    }

    pub fn is_empty(&self) -> bool {
        self.commit.is_empty()
    }

    pub fn event_count(&self) -> usize {
        self.commit.event_count()
    }

    /// Applies `events` to `aggregate` and stages them for commit.
    ///
    /// The stream's expected version is the aggregate's version the first
    /// time it is recorded in this unit.
    pub fn record<A: Aggregate>(
        &mut self,
        aggregate_id: AggregateId,
        aggregate: &mut A,
        events: Vec<A::Event>,
    ) -> Result<(), DomainError> {
        if events.is_empty() {
            return Ok(());
        }

        let expected = aggregate.version();
        let mut version = expected;
        let mut envelopes = Vec::with_capacity(events.len());
        for event in events {
            version = version.next();
            let envelope = EventEnvelope::builder()
                .aggregate_id(aggregate_id)
                .aggregate_type(A::aggregate_type())
                .event_type(event.event_type())
                .version(version)
                .correlation_id(self.commit.correlation_id)
                .payload(&event)?
                .build()?;
            envelopes.push(envelope);
            aggregate.apply(event);
            aggregate.set_version(version);
        }

        match self
            .commit
            .streams
            .iter_mut()
            .find(|s| s.aggregate_id == aggregate_id)
        {
            Some(stream) => stream.events.extend(envelopes),
            None => self.commit.push(StreamAppend::new(
                aggregate_id,
                A::aggregate_type(),
                expected,
                envelopes,
            )),
        }

        Ok(())
    }

    /// Writes every staged stream in one commit.
    ///
    /// An empty unit commits nothing and succeeds.
    pub async fn commit<S: EventStore + ?Sized>(self, store: &S) -> Result<Vec<Version>, DomainError> {
        if self.commit.is_empty() {
            return Ok(Vec::new());
        }
        Ok(store.commit(self.commit).await?)
    }
}

/// Loads aggregates from the store and runs single-aggregate commands.
pub struct CommandHandler<S, A>
where
    S: EventStore,
    A: Aggregate,
{
    store: S,
    _phantom: PhantomData<A>,
}

impl<S, A> CommandHandler<S, A>
where
    S: EventStore,
    A: Aggregate,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            _phantom: PhantomData,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Replays the aggregate's stream. A missing stream yields the default
    /// (uncreated) aggregate.
    pub async fn load(&self, aggregate_id: AggregateId) -> Result<A, DomainError> {
        let events = self.store.get_events_for_aggregate(aggregate_id).await?;

        let mut aggregate = A::default();
        for envelope in events {
            let event: A::Event = serde_json::from_value(envelope.payload)?;
            aggregate.apply(event);
            aggregate.set_version(envelope.version);
        }

        Ok(aggregate)
    }

    pub async fn load_existing(&self, aggregate_id: AggregateId) -> Result<Option<A>, DomainError> {
        let aggregate = self.load(aggregate_id).await?;
        if aggregate.id().is_some() {
            Ok(Some(aggregate))
        } else {
            Ok(None)
        }
    }

    /// Like [`load_existing`](Self::load_existing) but a missing aggregate is
    /// a `NotFound` error.
    pub async fn load_required(&self, aggregate_id: AggregateId) -> Result<A, DomainError> {
        self.load_existing(aggregate_id)
            .await?
            .ok_or(DomainError::NotFound {
                aggregate_type: A::aggregate_type(),
                aggregate_id,
            })
    }

    /// Loads the aggregate, runs `command_fn` and persists its events with an
    /// optimistic version check.
    pub async fn execute<F>(
        &self,
        aggregate_id: AggregateId,
        command_fn: F,
    ) -> Result<CommandResult<A>, DomainError>
    where
        F: FnOnce(&A) -> Result<Vec<A::Event>, A::Error>,
        DomainError: From<A::Error>,
    {
        let aggregate = self.load(aggregate_id).await?;
        self.execute_on(aggregate_id, aggregate, command_fn).await
    }

    /// Same as [`execute`](Self::execute) but fails with `NotFound` instead
    /// of running the command against an uncreated aggregate.
    pub async fn execute_existing<F>(
        &self,
        aggregate_id: AggregateId,
        command_fn: F,
    ) -> Result<CommandResult<A>, DomainError>
    where
        F: FnOnce(&A) -> Result<Vec<A::Event>, A::Error>,
        DomainError: From<A::Error>,
    {
        let aggregate = self.load_required(aggregate_id).await?;
        self.execute_on(aggregate_id, aggregate, command_fn).await
    }

    async fn execute_on<F>(
        &self,
        aggregate_id: AggregateId,
        mut aggregate: A,
        command_fn: F,
    ) -> Result<CommandResult<A>, DomainError>
    where
        F: FnOnce(&A) -> Result<Vec<A::Event>, A::Error>,
        DomainError: From<A::Error>,
    {
        let events = command_fn(&aggregate)?;

        let mut uow = UnitOfWork::new();
        uow.record(aggregate_id, &mut aggregate, events.clone())?;
        uow.commit(&self.store).await?;

        let new_version = aggregate.version();
        Ok(CommandResult {
            aggregate,
            events,
            new_version,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use event_store::{EventStoreError, InMemoryEventStore};
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize, Deserialize)]
    enum TallyEvent {
        Opened { name: String },
        Added { amount: i32 },
    }

    impl DomainEvent for TallyEvent {
        fn event_type(&self) -> &'static str {
            match self {
                TallyEvent::Opened { .. } => "TallyOpened",
                TallyEvent::Added { .. } => "TallyAdded",
            }
        }
    }

    #[derive(Debug, Default)]
    struct Tally {
        id: Option<AggregateId>,
        name: String,
        total: i32,
        version: Version,
    }

    #[derive(Debug, thiserror::Error)]
    #[error("negative amount {0}")]
    struct NegativeAmount(i32);

    impl From<NegativeAmount> for DomainError {
        fn from(e: NegativeAmount) -> Self {
            DomainError::Validation(e.to_string())
        }
    }

    impl Aggregate for Tally {
        type Event = TallyEvent;
        type Error = NegativeAmount;

        fn aggregate_type() -> &'static str {
            "Tally"
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
                TallyEvent::Opened { name } => {
                    self.id.get_or_insert_with(AggregateId::new);
                    self.name = name;
                }
                TallyEvent::Added { amount } => self.total += amount,
            }
        }
    }

    fn add(amount: i32) -> Result<Vec<TallyEvent>, NegativeAmount> {
        if amount < 0 {
            return Err(NegativeAmount(amount));
        }
        Ok(vec![TallyEvent::Added { amount }])
    }

    fn opened(name: &str) -> Vec<TallyEvent> {
        vec![TallyEvent::Opened {
            name: name.to_string(),
        }]
    }

    #[tokio::test]
    async fn execute_creates_and_updates() {
        let handler: CommandHandler<_, Tally> = CommandHandler::new(InMemoryEventStore::new());
        let id = AggregateId::new();

        handler.execute(id, |_| Ok(opened("visits"))).await.unwrap();
        let result = handler.execute(id, |_| add(4)).await.unwrap();

        assert_eq!(result.new_version, Version::new(2));
        assert_eq!(result.aggregate.total, 4);
        assert_eq!(result.aggregate.name, "visits");
    }

    #[tokio::test]
    async fn rejected_command_writes_nothing() {
        let store = InMemoryEventStore::new();
        let handler: CommandHandler<_, Tally> = CommandHandler::new(store.clone());
        let id = AggregateId::new();
        handler.execute(id, |_| Ok(opened("visits"))).await.unwrap();

        let result = handler.execute(id, |_| add(-1)).await;

        assert!(matches!(result, Err(DomainError::Validation(_))));
        assert_eq!(store.event_count().await, 1);
    }

    #[tokio::test]
    async fn execute_existing_requires_stream() {
        let handler: CommandHandler<_, Tally> = CommandHandler::new(InMemoryEventStore::new());
        let result = handler.execute_existing(AggregateId::new(), |_| add(1)).await;
        assert!(matches!(result, Err(DomainError::NotFound { .. })));
    }

    #[tokio::test]
    async fn empty_events_persist_nothing() {
        let store = InMemoryEventStore::new();
        let handler: CommandHandler<_, Tally> = CommandHandler::new(store.clone());

        let result = handler
            .execute(AggregateId::new(), |_| Ok(vec![]))
            .await
            .unwrap();

        assert_eq!(result.new_version, Version::initial());
        assert_eq!(store.event_count().await, 0);
    }

    #[tokio::test]
    async fn unit_of_work_merges_repeated_records_of_one_stream() {
        let store = InMemoryEventStore::new();
        let handler: CommandHandler<_, Tally> = CommandHandler::new(store.clone());
        let a = AggregateId::new();
        let b = AggregateId::new();
        handler.execute(a, |_| Ok(opened("a"))).await.unwrap();

        let mut tally_a = handler.load(a).await.unwrap();
        let mut tally_b = Tally::default();
        let mut uow = UnitOfWork::new();
        uow.record(a, &mut tally_a, add(1).unwrap()).unwrap();
        uow.record(b, &mut tally_b, opened("b")).unwrap();
        uow.record(a, &mut tally_a, add(2).unwrap()).unwrap();
        assert_eq!(uow.event_count(), 3);

        let versions = uow.commit(&store).await.unwrap();
        assert_eq!(versions, vec![Version::new(3), Version::first()]);
        assert_eq!(handler.load(a).await.unwrap().total, 3);
        assert_eq!(tally_a.version(), Version::new(3));
    }

    #[tokio::test]
    async fn stale_unit_of_work_conflicts() {
        let store = InMemoryEventStore::new();
        let handler: CommandHandler<_, Tally> = CommandHandler::new(store.clone());
        let id = AggregateId::new();
        handler.execute(id, |_| Ok(opened("visits"))).await.unwrap();

        let mut stale = handler.load(id).await.unwrap();
        handler.execute(id, |_| add(1)).await.unwrap();

        let mut uow = UnitOfWork::new();
        uow.record(id, &mut stale, add(5).unwrap()).unwrap();
        let err = uow.commit(&store).await.unwrap_err();

        assert!(matches!(
            err,
            DomainError::EventStore(EventStoreError::ConcurrencyConflict { .. })
        ));
        assert!(err.is_conflict());
    }
}
