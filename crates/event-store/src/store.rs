use std::collections::HashSet;
use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;
use uuid::Uuid;

use crate::{AggregateId, EventEnvelope, EventQuery, EventStoreError, Result, Version};

/// New events for one stream, guarded by the version the writer last saw.
#[derive(Debug, Clone)]
pub struct StreamAppend {
    pub aggregate_id: AggregateId,
    pub aggregate_type: String,
    /// The stream must still be at this version when the commit lands.
    pub expected_version: Version,
    pub events: Vec<EventEnvelope>,
}

impl StreamAppend {
    pub fn new(
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        expected_version: Version,
        events: Vec<EventEnvelope>,
    ) -> Self {
        Self {
            aggregate_id,
            aggregate_type: aggregate_type.into(),
            expected_version,
            events,
        }
    }

    /// Version of the stream once this append is applied.
    pub fn resulting_version(&self) -> Version {
        self.events
            .last()
            .map(|e| e.version)
            .unwrap_or(self.expected_version)
    }
}

/// An atomic write across one or more streams.
///
/// Either every stream append lands or none does; a single stale
/// `expected_version` rejects the whole commit.
#[derive(Debug, Clone)]
pub struct Commit {
    pub correlation_id: Uuid,
    pub streams: Vec<StreamAppend>,
}

impl Commit {
    pub fn new() -> Self {
        Self {
            correlation_id: Uuid::new_v4(),
            streams: Vec::new(),
        }
    }

    pub fn single(append: StreamAppend) -> Self {
        let mut commit = Self::new();
        commit.push(append);
        commit
    }

    pub fn push(&mut self, append: StreamAppend) {
        self.streams.push(append);
    }

    pub fn is_empty(&self) -> bool {
        self.streams.iter().all(|s| s.events.is_empty())
    }

    pub fn event_count(&self) -> usize {
        self.streams.iter().map(|s| s.events.len()).sum()
    }
}

impl Default for Commit {
    fn default() -> Self {
        Self::new()
    }
}

/// A stream of events.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<EventEnvelope>> + Send>>;

/// Durable, append-only storage of event streams.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Writes every stream in `commit` atomically.
    ///
    /// Fails with `ConcurrencyConflict` if any stream has moved past its
    /// `expected_version`; nothing is written in that case. Returns the new
    /// version of each stream in commit order.
    async fn commit(&self, commit: Commit) -> Result<Vec<Version>>;

    /// Events of one stream in version order.
    async fn get_events_for_aggregate(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<Vec<EventEnvelope>>;

    async fn query_events(&self, query: EventQuery) -> Result<Vec<EventEnvelope>>;

    /// Every stored event in commit order.
    async fn stream_all_events(&self) -> Result<EventStream>;

    /// Current version of a stream, or `None` if it has no events.
    async fn get_aggregate_version(&self, aggregate_id: AggregateId) -> Result<Option<Version>>;
}

#[async_trait]
pub trait EventStoreExt: EventStore {
    /// Appends events to a single stream.
    async fn append(&self, events: Vec<EventEnvelope>, expected_version: Version) -> Result<Version> {
        let first = events
            .first()
            .ok_or_else(|| EventStoreError::InvalidCommit("no events to append".to_string()))?;
        let append = StreamAppend::new(
            first.aggregate_id,
            first.aggregate_type.clone(),
            expected_version,
            events,
        );
        let versions = self.commit(Commit::single(append)).await?;
        Ok(versions.into_iter().next().unwrap_or(expected_version))
    }

    async fn aggregate_exists(&self, aggregate_id: AggregateId) -> Result<bool> {
        Ok(self.get_aggregate_version(aggregate_id).await?.is_some())
    }
}

impl<T: EventStore + ?Sized> EventStoreExt for T {}

/// Checks the shape of a commit before any stream is touched.
pub fn validate_commit(commit: &Commit) -> Result<()> {
    if commit.streams.is_empty() || commit.is_empty() {
        return Err(EventStoreError::InvalidCommit(
            "commit contains no events".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for stream in &commit.streams {
        if !seen.insert(stream.aggregate_id) {
            return Err(EventStoreError::InvalidCommit(format!(
                "stream {} appears twice in one commit",
                stream.aggregate_id
            )));
        }

        let mut expected = stream.expected_version;
        for event in &stream.events {
            if event.aggregate_id != stream.aggregate_id
                || event.aggregate_type != stream.aggregate_type
            {
                return Err(EventStoreError::InvalidCommit(format!(
                    "event {} does not belong to stream {}",
                    event.event_id, stream.aggregate_id
                )));
            }
            expected = expected.next();
            if event.version != expected {
                return Err(EventStoreError::InvalidCommit(format!(
                    "stream {}: expected version {expected}, got {}",
                    stream.aggregate_id, event.version
                )));
            }
        }
    }

    Ok(())
}
