//! Core projection trait and position tracking.

use async_trait::async_trait;
use event_store::EventEnvelope;
use serde::de::DeserializeOwned;

use crate::Result;

/// How many events of the log a projection has consumed.
///
/// Projections advance on every event, including ones they ignore, so the
/// position lines up with the log's commit order during catch-up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProjectionPosition {
    pub events_processed: u64,
}

impl ProjectionPosition {
    pub fn zero() -> Self {
        Self {
            events_processed: 0,
        }
    }

    pub fn advance(&self) -> Self {
        Self {
            events_processed: self.events_processed + 1,
        }
    }
}

impl std::fmt::Display for ProjectionPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "position({})", self.events_processed)
    }
}

/// Turns events into a read model.
#[async_trait]
pub trait Projection: Send + Sync {
    fn name(&self) -> &'static str;

    /// Handles one event. Must advance the position even for events of
    /// aggregates the projection does not follow.
    async fn handle(&self, event: &EventEnvelope) -> Result<()>;

    async fn position(&self) -> ProjectionPosition;

    /// Clears the read model back to its initial state.
    async fn reset(&self) -> Result<()>;
}

/// Decodes the payload of `event` if it belongs to `aggregate_type`.
pub(crate) fn decode_for<E: DeserializeOwned>(
    event: &EventEnvelope,
    aggregate_type: &str,
) -> Result<Option<E>> {
    if event.aggregate_type != aggregate_type {
        return Ok(None);
    }
    Ok(Some(serde_json::from_value(event.payload.clone())?))
}
