//! Daily payment code sequence.

use chrono::{DateTime, NaiveDate, Utc};
use common::AggregateId;
use event_store::Version;
use serde::{Deserialize, Serialize};

use crate::aggregate::{Aggregate, DomainEvent};

use super::PaymentError;

/// Issues `PAG-YYYYMMDD-NNNN` codes for one calendar day.
///
/// There is one stream per day with an id derived from the date, so two
/// payments created concurrently on the same day conflict on this stream
/// and one of them retries with the next number.
#[derive(Debug, Clone, Default)]
pub struct PaymentCodeSequence {
    id: Option<AggregateId>,
    version: Version,
    day: Option<NaiveDate>,
    last: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum SequenceEvent {
    CodeIssued(CodeIssuedData),
}

impl DomainEvent for SequenceEvent {
    fn event_type(&self) -> &'static str {
        match self {
            SequenceEvent::CodeIssued(_) => "PaymentCodeIssued",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeIssuedData {
    pub day: NaiveDate,
    pub sequence: u32,
    pub code: String,
    pub payment_id: AggregateId,
    pub issued_at: DateTime<Utc>,
}

impl Aggregate for PaymentCodeSequence {
    type Event = SequenceEvent;
    type Error = PaymentError;

    fn aggregate_type() -> &'static str {
        "PaymentCodeSequence"
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
            SequenceEvent::CodeIssued(data) => {
                self.id = Some(Self::id_for(data.day));
                self.day = Some(data.day);
                self.last = data.sequence;
            }
        }
    }
}

impl PaymentCodeSequence {
    pub fn id_for(day: NaiveDate) -> AggregateId {
        AggregateId::derived(Self::aggregate_type(), &day.format("%Y%m%d").to_string())
    }

    pub fn format_code(day: NaiveDate, sequence: u32) -> String {
        format!("PAG-{}-{sequence:04}", day.format("%Y%m%d"))
    }

    /// Highest number issued so far; 0 before the first code.
    pub fn last(&self) -> u32 {
        self.last
    }

    pub fn issue(
        &self,
        day: NaiveDate,
        payment_id: AggregateId,
        now: DateTime<Utc>,
    ) -> Result<Vec<SequenceEvent>, PaymentError> {
        if self.day.is_some_and(|d| d != day) {
            return Err(PaymentError::Validation(format!(
                "sequence for {:?} cannot issue codes for {day}",
                self.day
            )));
        }
        let sequence = self
            .last
            .checked_add(1)
            .ok_or_else(|| PaymentError::Validation("payment code sequence exhausted".to_string()))?;

        Ok(vec![SequenceEvent::CodeIssued(CodeIssuedData {
            day,
            sequence,
            code: Self::format_code(day, sequence),
            payment_id,
            issued_at: now,
        })])
    }
}
