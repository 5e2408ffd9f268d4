//! Projection processor for feeding events to projections.

use event_store::{EventEnvelope, EventStore};
use futures_util::StreamExt;

use crate::Result;
use crate::projection::Projection;

/// Feeds the event log to the registered projections.
///
/// - Catch-up: replays the log in commit order, skipping events a
///   projection has already seen
/// - Single event delivery, for events just committed
/// - Rebuild: resets every projection and replays from scratch
pub struct ProjectionProcessor<S: EventStore> {
    store: S,
    projections: Vec<Box<dyn Projection>>,
}

impl<S: EventStore> ProjectionProcessor<S> {
    /// Creates a new processor with the given event store.
    pub fn new(store: S) -> Self {
        Self {
            store,
            projections: Vec::new(),
        }
    }

    /// Registers a projection with this processor.
    pub fn register(&mut self, projection: Box<dyn Projection>) {
        tracing::debug!(projection = projection.name(), "projection registered");
        self.projections.push(projection);
    }

    /// Returns the number of registered projections.
    pub fn projection_count(&self) -> usize {
        self.projections.len()
    }

    /// Streams the whole log and delivers each event to every projection
    /// that has not seen it yet. Returns the number of events read.
    #[tracing::instrument(skip(self))]
    pub async fn run_catch_up(&self) -> Result<u64> {
        let mut stream = self.store.stream_all_events().await?;
        let mut event_index: u64 = 0;

        while let Some(result) = stream.next().await {
            let event = result?;
            event_index += 1;

            for projection in &self.projections {
                let pos = projection.position().await;
                if pos.events_processed < event_index {
                    projection.handle(&event).await?;
                    metrics::counter!("projections_events_processed").increment(1);
                }
            }
        }

        tracing::info!(events_processed = event_index, "catch-up complete");

        Ok(event_index)
    }

    /// Delivers a single event to all registered projections.
    #[tracing::instrument(skip(self, event), fields(event_type = %event.event_type))]
    pub async fn process_event(&self, event: &EventEnvelope) -> Result<()> {
        for projection in &self.projections {
            projection.handle(event).await?;
            metrics::counter!("projections_events_processed").increment(1);
        }
        Ok(())
    }

    /// Resets all projections and replays all events from the store.
    #[tracing::instrument(skip(self))]
    pub async fn rebuild_all(&self) -> Result<u64> {
        for projection in &self.projections {
            projection.reset().await?;
        }
        self.run_catch_up().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::ProjectionPosition;
    use async_trait::async_trait;
    use common::AggregateId;
    use event_store::{EventStoreExt, InMemoryEventStore, Version};
    use std::sync::Arc;
    use tokio::sync::RwLock;

    /// Counts every event it is handed.
    struct CountingProjection {
        count: Arc<RwLock<u64>>,
        position: Arc<RwLock<ProjectionPosition>>,
    }

    impl CountingProjection {
        fn new() -> Self {
            Self {
                count: Arc::new(RwLock::new(0)),
                position: Arc::new(RwLock::new(ProjectionPosition::zero())),
            }
        }
    }

    #[async_trait]
    impl Projection for CountingProjection {
        fn name(&self) -> &'static str {
            "CountingProjection"
        }

        async fn handle(&self, _event: &EventEnvelope) -> Result<()> {
            *self.count.write().await += 1;
            let mut pos = self.position.write().await;
            *pos = pos.advance();
            Ok(())
        }

        async fn position(&self) -> ProjectionPosition {
            *self.position.read().await
        }

        async fn reset(&self) -> Result<()> {
            *self.count.write().await = 0;
            *self.position.write().await = ProjectionPosition::zero();
            Ok(())
        }
    }

    fn test_event(aggregate_id: AggregateId, version: i64) -> EventEnvelope {
        EventEnvelope::builder()
            .aggregate_id(aggregate_id)
            .aggregate_type("Medication")
            .event_type("TestEvent")
            .version(Version::new(version))
            .payload_raw(serde_json::json!({"test": true}))
            .build()
            .unwrap()
    }

    async fn store_with(n: i64) -> InMemoryEventStore {
        let store = InMemoryEventStore::new();
        if n > 0 {
            let id = AggregateId::new();
            let events = (1..=n).map(|v| test_event(id, v)).collect();
            store.append(events, Version::initial()).await.unwrap();
        }
        store
    }

    #[tokio::test]
    async fn catch_up_processes_all_events() {
        let projection = CountingProjection::new();
        let count = Arc::clone(&projection.count);
        let mut processor = ProjectionProcessor::new(store_with(3).await);
        processor.register(Box::new(projection));

        let read = processor.run_catch_up().await.unwrap();

        assert_eq!(read, 3);
        assert_eq!(*count.read().await, 3);
    }

    #[tokio::test]
    async fn process_single_event() {
        let projection = CountingProjection::new();
        let count = Arc::clone(&projection.count);
        let mut processor = ProjectionProcessor::new(InMemoryEventStore::new());
        processor.register(Box::new(projection));

        processor
            .process_event(&test_event(AggregateId::new(), 1))
            .await
            .unwrap();

        assert_eq!(*count.read().await, 1);
    }

    #[tokio::test]
    async fn rebuild_resets_and_replays() {
        let projection = CountingProjection::new();
        let count = Arc::clone(&projection.count);
        let position = Arc::clone(&projection.position);
        let mut processor = ProjectionProcessor::new(store_with(2).await);
        processor.register(Box::new(projection));

        processor.run_catch_up().await.unwrap();
        processor.rebuild_all().await.unwrap();

        assert_eq!(*count.read().await, 2);
        assert_eq!(position.read().await.events_processed, 2);
    }

    #[tokio::test]
    async fn catch_up_skips_already_processed() {
        let projection = CountingProjection::new();
        let count = Arc::clone(&projection.count);
        let mut processor = ProjectionProcessor::new(store_with(3).await);
        processor.register(Box::new(projection));

        processor.run_catch_up().await.unwrap();
        processor.run_catch_up().await.unwrap();

        assert_eq!(*count.read().await, 3);
    }

    #[tokio::test]
    async fn empty_store_catch_up() {
        let projection = CountingProjection::new();
        let count = Arc::clone(&projection.count);
        let mut processor = ProjectionProcessor::new(store_with(0).await);
        processor.register(Box::new(projection));

        processor.run_catch_up().await.unwrap();

        assert_eq!(*count.read().await, 0);
    }

    #[tokio::test]
    async fn multiple_projections_see_every_event() {
        let first = CountingProjection::new();
        let second = CountingProjection::new();
        let count1 = Arc::clone(&first.count);
        let count2 = Arc::clone(&second.count);
        let mut processor = ProjectionProcessor::new(store_with(2).await);
        processor.register(Box::new(first));
        processor.register(Box::new(second));
        assert_eq!(processor.projection_count(), 2);

        processor.run_catch_up().await.unwrap();

        assert_eq!(*count1.read().await, 2);
        assert_eq!(*count2.read().await, 2);
    }
}
