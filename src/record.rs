// Inbound event records
//
// Wire shape delivered by the event bus:
// {"meta":{"instance_identifier":"es-accesslog","timestamp":1709769600000},
//  "message":{"level":"INFO","message":"..."}}

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("malformed record: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("record has an empty instance_identifier")]
    EmptyIdentifier,

    #[error("record timestamp {0} is outside the representable range")]
    TimestampOutOfRange(i64),
}

/// One event waiting to be indexed.
#[derive(Debug, Clone, PartialEq)]
pub struct IncomingRecord {
    pub destination_identifier: String,
    pub event_timestamp: DateTime<Utc>,
    pub payload: Map<String, Value>,
}

#[derive(Deserialize)]
struct Envelope {
    meta: Meta,
    #[serde(default)]
    message: Map<String, Value>,
}

#[derive(Deserialize)]
struct Meta {
    instance_identifier: String,
    timestamp: i64,
}

impl IncomingRecord {
    pub fn new(
        destination_identifier: impl Into<String>,
        event_timestamp_millis: i64,
        payload: Map<String, Value>,
    ) -> Result<Self, RecordError> {
        let destination_identifier = destination_identifier.into();
        if destination_identifier.is_empty() {
            return Err(RecordError::EmptyIdentifier);
        }
        let event_timestamp = DateTime::from_timestamp_millis(event_timestamp_millis)
            .ok_or(RecordError::TimestampOutOfRange(event_timestamp_millis))?;

        Ok(Self {
            destination_identifier,
            event_timestamp,
            payload,
        })
    }

    /// Parses one record in the bus wire shape.
    pub fn from_json(json: &str) -> Result<Self, RecordError> {
        let envelope: Envelope = serde_json::from_str(json)?;
        Self::new(
            envelope.meta.instance_identifier,
            envelope.meta.timestamp,
            envelope.message,
        )
    }

    pub fn event_timestamp_millis(&self) -> i64 {
        self.event_timestamp.timestamp_millis()
    }
}
