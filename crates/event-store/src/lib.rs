//! Append-only event log for the clinic aggregates.
//!
//! Events are grouped into streams, one per aggregate instance. Writers
//! submit a [`Commit`] holding appends for one or more streams; each append
//! names the version it expects the stream to be at, and the whole commit is
//! rejected with [`EventStoreError::ConcurrencyConflict`] if any stream moved.

pub mod error;
pub mod event;
pub mod memory;
pub mod postgres;
pub mod query;
pub mod store;

pub use common::AggregateId;
pub use error::{EventStoreError, Result};
pub use event::{EventEnvelope, EventEnvelopeBuilder, EventId, Version};
pub use memory::InMemoryEventStore;
pub use postgres::PostgresEventStore;
pub use query::EventQuery;
pub use store::{Commit, EventStore, EventStoreExt, EventStream, StreamAppend};
