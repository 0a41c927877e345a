//! The message published to the bus.

use crate::error::OutboxResult;
use crate::event::OutboxEvent;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Wire form of a published outbox event.
///
/// Serialized as JSON with camel-case keys and RFC 3339 timestamps:
///
/// ```json
/// {"id":"evt-1","topic":"orders","timeCreated":"2024-01-01T00:00:00Z","timeSent":"2024-01-01T00:00:01Z","data":{}}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventEnvelope {
    /// Event id. Consumers use it as their idempotency key.
    pub id: String,
    /// Topic the event was published to.
    pub topic: String,
    /// When the event was queued.
    pub time_created: DateTime<Utc>,
    /// When the event was handed to the bus.
    pub time_sent: DateTime<Utc>,
    /// Message payload.
    pub data: serde_json::Value,
}

impl EventEnvelope {
    /// Builds the envelope for `event`, sent at `time_sent`.
    ///
    /// # Errors
    ///
    /// Fails if the payload cannot be represented as JSON.
    pub fn from_event(event: &OutboxEvent, time_sent: DateTime<Utc>) -> OutboxResult<Self> {
        Ok(Self {
            id: event.id.clone(),
            topic: event.topic.clone(),
            time_created: event.time_created,
            time_sent,
            data: event.data.to_json()?,
        })
    }

    /// Encodes the envelope as JSON.
    ///
    /// # Errors
    ///
    /// Fails if serialization fails.
    pub fn to_json_bytes(&self) -> OutboxResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decodes an envelope received from the bus.
    ///
    /// # Errors
    ///
    /// Fails on malformed JSON or missing fields.
    pub fn from_json_bytes(bytes: &[u8]) -> OutboxResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
