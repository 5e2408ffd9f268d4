//! Identifiers shared across the clinic workspace.

mod types;

pub use types::{ActorId, AggregateId};
