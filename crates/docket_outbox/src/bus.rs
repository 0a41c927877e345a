//! Message bus abstraction.

use crate::envelope::EventEnvelope;
use crate::error::BusError;
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// A message bus delivers published envelopes to subscribers of a topic.
///
/// No ordering is assumed beyond the order in which the outbox worker
/// publishes.
pub trait MessageBus: Send + Sync {
    /// Publishes `message` to `topic`.
    fn publish(&self, topic: &str, message: &EventEnvelope) -> Result<(), BusError>;
}

impl<B: MessageBus + ?Sized> MessageBus for &B {
    fn publish(&self, topic: &str, message: &EventEnvelope) -> Result<(), BusError> {
        (**self).publish(topic, message)
    }
}

impl<B: MessageBus + ?Sized> MessageBus for Arc<B> {
    fn publish(&self, topic: &str, message: &EventEnvelope) -> Result<(), BusError> {
        (**self).publish(topic, message)
    }
}

/// An in-memory bus for testing.
///
/// Records every successful publication and can be told to fail.
#[derive(Debug, Default)]
pub struct InMemoryBus {
    published: RwLock<Vec<(String, EventEnvelope)>>,
    fail_next: AtomicU32,
    failing_topics: RwLock<HashSet<String>>,
}

impl InMemoryBus {
    /// Creates an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `n` publications fail as unavailable.
    pub fn fail_next(&self, n: u32) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    /// Makes every publication to `topic` fail as rejected.
    pub fn fail_topic(&self, topic: impl Into<String>) {
        self.failing_topics.write().insert(topic.into());
    }

    /// Removes every injected failure.
    pub fn clear_failures(&self) {
        self.fail_next.store(0, Ordering::SeqCst);
        self.failing_topics.write().clear();
    }

    /// Returns every published envelope, oldest first.
    #[must_use]
    pub fn published(&self) -> Vec<EventEnvelope> {
        self.published.read().iter().map(|(_, m)| m.clone()).collect()
    }

    /// Returns the envelopes published to `topic`, oldest first.
    #[must_use]
    pub fn published_to(&self, topic: &str) -> Vec<EventEnvelope> {
        self.published
            .read()
            .iter()
            .filter(|(t, _)| t == topic)
            .map(|(_, m)| m.clone())
            .collect()
    }

    /// Returns the number of successful publications.
    #[must_use]
    pub fn len(&self) -> usize {
        self.published.read().len()
    }

    /// Returns true if nothing was published.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.published.read().is_empty()
    }
}

impl MessageBus for InMemoryBus {
    fn publish(&self, topic: &str, message: &EventEnvelope) -> Result<(), BusError> {
        if self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(BusError::unavailable("injected failure"));
        }
        if self.failing_topics.read().contains(topic) {
            return Err(BusError::rejected(topic, "topic is failing"));
        }
        self.published
            .write()
            .push((topic.to_string(), message.clone()));
        Ok(())
    }
}
