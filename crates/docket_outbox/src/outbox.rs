//! The outbox repository.

use crate::event::OutboxEvent;
use docket_codec::Value;
use docket_core::{
    Clock, CollectionPath, CoreError, CoreResult, Direction, DocumentWrite, EntitySet,
    IdGenerator, Query, Repository, SystemClock, TransactionCoordinator, UuidGenerator,
};
use std::sync::Arc;
use tracing::debug;

/// Stores outgoing messages in the same transaction as the business change
/// that produced them.
///
/// Register the outbox alongside the business repositories; a queued event
/// is created iff the unit of work commits.
pub struct Outbox {
    collection: CollectionPath,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
    events: EntitySet<OutboxEvent>,
}

impl Outbox {
    /// Creates an outbox over `collection` with random ids and the system clock.
    pub fn new(collection: CollectionPath) -> Self {
        Self {
            collection,
            ids: Arc::new(UuidGenerator),
            clock: Arc::new(SystemClock),
            events: EntitySet::new(),
        }
    }

    /// Sets the id generator.
    #[must_use]
    pub fn with_ids(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    /// Sets the clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Returns the outbox collection.
    pub fn collection(&self) -> &CollectionPath {
        &self.collection
    }

    /// Queues a new event for `topic` and returns its id.
    pub fn queue(&mut self, data: impl Into<Value>, topic: impl Into<String>) -> String {
        let event = OutboxEvent::new(self.ids.next_id(), topic, data.into(), self.clock.now());
        let id = event.id.clone();
        debug!(event = %id, topic = %event.topic, "queued outbox event");
        self.add(event);
        id
    }

    fn unsent(&self) -> Query {
        Query::collection(self.collection.clone())
            .where_eq("sentToBus", false)
            .order_by("timeCreated", Direction::Ascending)
            .limit(1)
    }

    /// Reads the oldest unsent event, or `None` if the outbox is drained.
    ///
    /// The event is tracked, so [`Outbox::mark_sent`] only writes the fields
    /// that changed.
    ///
    /// # Errors
    ///
    /// Propagates read failures and malformed stored events.
    pub fn next_to_send(
        &mut self,
        coordinator: &mut TransactionCoordinator<'_>,
    ) -> CoreResult<Option<OutboxEvent>> {
        let Some(snapshot) = coordinator.query(&self.unsent())?.into_iter().next() else {
            return Ok(None);
        };
        let event = OutboxEvent::from_document(&snapshot.into_data()?)?;
        self.track(event.clone());
        Ok(Some(event))
    }

    /// Like [`Outbox::next_to_send`], but a drained outbox is an error.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] if no unsent event exists.
    pub fn get_next_to_send(
        &mut self,
        coordinator: &mut TransactionCoordinator<'_>,
    ) -> CoreResult<OutboxEvent> {
        self.next_to_send(coordinator)?
            .ok_or_else(|| CoreError::not_found(format!("unsent event in {}", self.collection)))
    }

    /// Marks `event` as published now.
    pub fn mark_sent(&mut self, mut event: OutboxEvent) {
        event.mark_sent(self.clock.now());
        self.add(event);
    }

    /// Deletes `event` instead of keeping it as sent.
    pub fn discard(&mut self, event: OutboxEvent) {
        self.remove(event);
    }
}

impl Repository for Outbox {
    type Entity = OutboxEvent;

    fn entities(&self) -> &EntitySet<OutboxEvent> {
        &self.events
    }

    fn entities_mut(&mut self) -> &mut EntitySet<OutboxEvent> {
        &mut self.events
    }

    fn to_documents(&self, event: &OutboxEvent) -> CoreResult<Vec<DocumentWrite>> {
        Ok(vec![DocumentWrite::new(
            self.collection.doc(&event.id)?,
            event.to_write_data(),
        )])
    }
}
