//! The inbox repository: an idempotency ledger for inbound events.

use crate::fields;
use chrono::{DateTime, Utc};
use docket_codec::CodecResult;
use docket_core::{
    Clock, CollectionPath, CoreResult, Document, DocumentWrite, EntitySet, FieldWrite,
    Identifiable, Repository, SystemClock, TransactionCoordinator, WriteData,
};
use std::sync::Arc;
use tracing::debug;

/// Marker that an inbound event was processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboxRecord {
    /// Id of the inbound event.
    pub id: String,
    /// When processing committed.
    pub time_received: DateTime<Utc>,
}

impl InboxRecord {
    /// Returns the stored field data.
    pub fn to_write_data(&self) -> WriteData {
        WriteData::from([
            ("id".to_string(), FieldWrite::set(self.id.as_str())),
            ("timeReceived".to_string(), fields::set_instant(self.time_received)),
        ])
    }

    /// Reads a record from stored field data.
    ///
    /// # Errors
    ///
    /// Fails if a field is missing or has the wrong type.
    pub fn from_document(doc: &Document) -> CodecResult<Self> {
        Ok(Self {
            id: fields::text(doc, "id")?,
            time_received: fields::instant(doc, "timeReceived")?,
        })
    }
}

impl Identifiable for InboxRecord {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Records which inbound events were already handled.
///
/// Call [`Inbox::record`] in the same unit of work as the side effects of
/// handling an event: a redelivered event then either finds the record and
/// is skipped, or is processed again in full.
pub struct Inbox {
    collection: CollectionPath,
    clock: Arc<dyn Clock>,
    records: EntitySet<InboxRecord>,
}

impl Inbox {
    /// Creates an inbox over `collection` using the system clock.
    pub fn new(collection: CollectionPath) -> Self {
        Self {
            collection,
            clock: Arc::new(SystemClock),
            records: EntitySet::new(),
        }
    }

    /// Sets the clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Returns the inbox collection.
    pub fn collection(&self) -> &CollectionPath {
        &self.collection
    }

    /// Reads the record for event `id`.
    ///
    /// # Errors
    ///
    /// Returns [`docket_core::CoreError::NotFound`] if the event was never
    /// recorded.
    pub fn get(
        &mut self,
        coordinator: &mut TransactionCoordinator<'_>,
        id: &str,
    ) -> CoreResult<InboxRecord> {
        let snapshot = coordinator.get(&self.collection.doc(id)?)?;
        let record = InboxRecord::from_document(&snapshot.into_data()?)?;
        self.track(record.clone());
        Ok(record)
    }

    /// Returns true if event `id` was already recorded.
    ///
    /// Absence is not an error. An id that cannot name a document (empty,
    /// or containing `/`) can never have been recorded and yields `false`.
    ///
    /// # Errors
    ///
    /// Propagates read failures.
    pub fn did_process_event(
        &self,
        coordinator: &mut TransactionCoordinator<'_>,
        id: &str,
    ) -> CoreResult<bool> {
        let Ok(path) = self.collection.doc(id) else {
            debug!(event = id, inbox = %self.collection, "event id is not a document key");
            return Ok(false);
        };
        Ok(coordinator.get(&path)?.exists())
    }

    /// Records event `id` as processed. Persists with the unit of work.
    pub fn record(&mut self, id: impl Into<String>) -> InboxRecord {
        let record = InboxRecord {
            id: id.into(),
            time_received: self.clock.now(),
        };
        self.add(record.clone());
        record
    }
}

impl Repository for Inbox {
    type Entity = InboxRecord;

    fn entities(&self) -> &EntitySet<InboxRecord> {
        &self.records
    }

    fn entities_mut(&mut self) -> &mut EntitySet<InboxRecord> {
        &mut self.records
    }

    fn to_documents(&self, record: &InboxRecord) -> CoreResult<Vec<DocumentWrite>> {
        Ok(vec![DocumentWrite::new(
            self.collection.doc(&record.id)?,
            record.to_write_data(),
        )])
    }
}
