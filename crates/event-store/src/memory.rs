use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    AggregateId, EventEnvelope, EventQuery, EventStoreError, Result, Version,
    store::{Commit, EventStore, EventStream, validate_commit},
};

#[derive(Default)]
struct Inner {
    /// Every event in commit order.
    log: Vec<EventEnvelope>,
    versions: HashMap<AggregateId, Version>,
}

/// Event store held entirely in memory.
///
/// Used by tests and by the report binary when no database is configured.
#[derive(Clone, Default)]
pub struct InMemoryEventStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn event_count(&self) -> usize {
        self.inner.read().await.log.len()
    }

    pub async fn clear(&self) {
        let mut inner = self.inner.write().await;
        inner.log.clear();
        inner.versions.clear();
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn commit(&self, commit: Commit) -> Result<Vec<Version>> {
        validate_commit(&commit)?;

        let mut inner = self.inner.write().await;

        // Check every stream before writing any of them.
        for stream in &commit.streams {
            let actual = inner
                .versions
                .get(&stream.aggregate_id)
                .copied()
                .unwrap_or_default();
            if actual != stream.expected_version {
                return Err(EventStoreError::ConcurrencyConflict {
                    aggregate_id: stream.aggregate_id,
                    expected: stream.expected_version,
                    actual,
                });
            }
        }

        let correlation = serde_json::Value::String(commit.correlation_id.to_string());
        let mut versions = Vec::with_capacity(commit.streams.len());
        for stream in commit.streams {
            let new_version = stream.resulting_version();
            inner.versions.insert(stream.aggregate_id, new_version);
            for mut event in stream.events {
                event
                    .metadata
                    .entry("correlation_id".to_string())
                    .or_insert_with(|| correlation.clone());
                inner.log.push(event);
            }
            versions.push(new_version);
        }

        Ok(versions)
    }

    async fn get_events_for_aggregate(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<Vec<EventEnvelope>> {
        let inner = self.inner.read().await;
        Ok(inner
            .log
            .iter()
            .filter(|e| e.aggregate_id == aggregate_id)
            .cloned()
            .collect())
    }

    async fn query_events(&self, query: EventQuery) -> Result<Vec<EventEnvelope>> {
        let inner = self.inner.read().await;
        let events = inner
            .log
            .iter()
            .filter(|e| query.matches(e))
            .skip(query.offset.unwrap_or(0))
            .take(query.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect();
        Ok(events)
    }

    async fn stream_all_events(&self) -> Result<EventStream> {
        use futures_util::stream;

        let events = self.inner.read().await.log.clone();
        Ok(Box::pin(stream::iter(events.into_iter().map(Ok))))
    }

    async fn get_aggregate_version(&self, aggregate_id: AggregateId) -> Result<Option<Version>> {
        Ok(self.inner.read().await.versions.get(&aggregate_id).copied())
    }
}
