use chrono::{DateTime, Utc};

use crate::{AggregateId, EventEnvelope, Version};

/// Filter over stored events.
///
/// All set criteria must match. Results come back in commit order.
#[derive(Debug, Clone, Default)]
pub struct EventQuery {
    pub aggregate_id: Option<AggregateId>,
    pub aggregate_type: Option<String>,
    /// Any of these event types.
    pub event_types: Option<Vec<String>>,
    /// Minimum stream version, inclusive.
    pub from_version: Option<Version>,
    /// Events recorded at or after this instant.
    pub since: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl EventQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_aggregate(aggregate_id: AggregateId) -> Self {
        Self::new().aggregate_id(aggregate_id)
    }

    /// Every event of one aggregate kind, e.g. all `"Payment"` streams.
    pub fn for_aggregate_type(aggregate_type: impl Into<String>) -> Self {
        Self::new().aggregate_type(aggregate_type)
    }

    pub fn aggregate_id(mut self, id: AggregateId) -> Self {
        self.aggregate_id = Some(id);
        self
    }

    pub fn aggregate_type(mut self, aggregate_type: impl Into<String>) -> Self {
        self.aggregate_type = Some(aggregate_type.into());
        self
    }

    pub fn event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_types
            .get_or_insert_with(Vec::new)
            .push(event_type.into());
        self
    }

    pub fn from_version(mut self, version: Version) -> Self {
        self.from_version = Some(version);
        self
    }

    pub fn since(mut self, timestamp: DateTime<Utc>) -> Self {
        self.since = Some(timestamp);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Whether `event` passes every filter. Paging is not considered.
    pub fn matches(&self, event: &EventEnvelope) -> bool {
        if self.aggregate_id.is_some_and(|id| id != event.aggregate_id) {
            return false;
        }
        if self
            .aggregate_type
            .as_deref()
            .is_some_and(|t| t != event.aggregate_type)
        {
            return false;
        }
        if self
            .event_types
            .as_ref()
            .is_some_and(|types| !types.iter().any(|t| *t == event.event_type))
        {
            return false;
        }
        if self.from_version.is_some_and(|v| event.version < v) {
            return false;
        }
        if self.since.is_some_and(|ts| event.timestamp < ts) {
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(aggregate_type: &str, event_type: &str, version: i64) -> EventEnvelope {
        EventEnvelope::builder()
            .event_type(event_type)
            .aggregate_id(AggregateId::new())
            .aggregate_type(aggregate_type)
            .version(Version::new(version))
            .payload_raw(serde_json::json!({}))
            .build()
            .unwrap()
    }

    #[test]
    fn event_type_accumulates() {
        let query = EventQuery::new()
            .event_type("PaymentCompleted")
            .event_type("PaymentRefunded");

        assert_eq!(
            query.event_types,
            Some(vec![
                "PaymentCompleted".to_string(),
                "PaymentRefunded".to_string()
            ])
        );
    }

    #[test]
    fn matches_filters_by_type_and_version() {
        let query = EventQuery::for_aggregate_type("Medication")
            .event_type("StockDispensed")
            .from_version(Version::new(2));

        assert!(query.matches(&envelope("Medication", "StockDispensed", 3)));
        assert!(!query.matches(&envelope("Medication", "StockDispensed", 1)));
        assert!(!query.matches(&envelope("Medication", "LotReceived", 3)));
        assert!(!query.matches(&envelope("Payment", "StockDispensed", 3)));
    }

    #[test]
    fn matches_by_aggregate_id() {
        let event = envelope("Appointment", "AppointmentScheduled", 1);
        assert!(EventQuery::for_aggregate(event.aggregate_id).matches(&event));
        assert!(!EventQuery::for_aggregate(AggregateId::new()).matches(&event));
    }
}
