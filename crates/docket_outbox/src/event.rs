//! Outbox events and their stored form.

use crate::fields;
use chrono::{DateTime, Utc};
use docket_codec::{CodecResult, Value};
use docket_core::{Document, FieldWrite, Identifiable, WriteData};

/// A message waiting in, or already sent from, the outbox.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboxEvent {
    /// Unique event id; also the document id.
    pub id: String,
    /// Bus topic to publish to.
    pub topic: String,
    /// When the event was queued.
    pub time_created: DateTime<Utc>,
    /// When the event was handed to the bus.
    pub time_sent: Option<DateTime<Utc>>,
    /// Whether the event has been published.
    pub sent_to_bus: bool,
    /// Message payload.
    pub data: Value,
}

impl OutboxEvent {
    /// Creates an unsent event.
    pub fn new(
        id: impl Into<String>,
        topic: impl Into<String>,
        data: Value,
        time_created: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            topic: topic.into(),
            time_created,
            time_sent: None,
            sent_to_bus: false,
            data,
        }
    }

    /// Records that the event was published at `now`.
    pub fn mark_sent(&mut self, now: DateTime<Utc>) {
        self.sent_to_bus = true;
        self.time_sent = Some(now);
    }

    /// Returns the stored field data. An absent `timeSent` is written as
    /// unset so clearing it removes the field.
    pub fn to_write_data(&self) -> WriteData {
        WriteData::from([
            ("id".to_string(), FieldWrite::set(self.id.as_str())),
            ("topic".to_string(), FieldWrite::set(self.topic.as_str())),
            ("timeCreated".to_string(), fields::set_instant(self.time_created)),
            (
                "timeSent".to_string(),
                self.time_sent.map_or(FieldWrite::Unset, fields::set_instant),
            ),
            ("sentToBus".to_string(), FieldWrite::set(self.sent_to_bus)),
            ("data".to_string(), FieldWrite::Set(self.data.clone())),
        ])
    }

    /// Reads an event from stored field data.
    ///
    /// # Errors
    ///
    /// Fails if a field is missing or has the wrong type. A missing `data`
    /// field reads as null.
    pub fn from_document(doc: &Document) -> CodecResult<Self> {
        Ok(Self {
            id: fields::text(doc, "id")?,
            topic: fields::text(doc, "topic")?,
            time_created: fields::instant(doc, "timeCreated")?,
            time_sent: fields::optional_instant(doc, "timeSent")?,
            sent_to_bus: fields::boolean(doc, "sentToBus")?,
            data: doc.get("data").cloned().unwrap_or(Value::Null),
        })
    }
}

impl Identifiable for OutboxEvent {
    fn id(&self) -> &str {
        &self.id
    }
}
