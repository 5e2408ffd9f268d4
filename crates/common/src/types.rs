use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Namespace for ids derived from natural keys (e.g. one payment code
/// sequence per calendar day).
const DERIVED_ID_NAMESPACE: Uuid = Uuid::from_u128(0x6f1c_2a7e_9b3d_4c58_a0e4_17d2_8c3b_5f90);

/// Identifier of an event stream: an appointment, a medication, a payment
/// or a payment code sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AggregateId(Uuid);

impl AggregateId {
    /// Creates a new random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Derives a stable id from a natural key.
    ///
    /// The same `kind`/`key` pair always yields the same id, so two writers
    /// racing to create the same stream collide on its version.
    pub fn derived(kind: &str, key: &str) -> Self {
        let name = format!("{kind}:{key}");
        Self(Uuid::new_v5(&DERIVED_ID_NAMESPACE, name.as_bytes()))
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for AggregateId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AggregateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for AggregateId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<AggregateId> for Uuid {
    fn from(id: AggregateId) -> Self {
        id.0
    }
}

/// The staff member or system process that initiated a change.
///
/// Recorded on audit entries; the clinic's user directory is external, so
/// this is an opaque handle rather than a foreign key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(String);

impl ActorId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Actor used for changes made by the application itself.
    pub fn system() -> Self {
        Self("system".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ActorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ActorId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ActorId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_ids_are_unique() {
        assert_ne!(AggregateId::new(), AggregateId::new());
    }

    #[test]
    fn derived_ids_are_stable_per_key() {
        let a = AggregateId::derived("PaymentCodeSequence", "20250110");
        let b = AggregateId::derived("PaymentCodeSequence", "20250110");
        let c = AggregateId::derived("PaymentCodeSequence", "20250111");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn derived_ids_differ_by_kind() {
        let a = AggregateId::derived("A", "key");
        let b = AggregateId::derived("B", "key");
        assert_ne!(a, b);
    }

    #[test]
    fn aggregate_id_serializes_as_plain_uuid() {
        let uuid = Uuid::new_v4();
        let id = AggregateId::from_uuid(uuid);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{uuid}\""));
    }

    #[test]
    fn actor_id_display() {
        assert_eq!(ActorId::new("dr.rivera").to_string(), "dr.rivera");
        assert_eq!(ActorId::system().as_str(), "system");
    }
}
