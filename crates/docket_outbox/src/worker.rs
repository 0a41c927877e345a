//! The outbox worker: publishes queued events one transaction at a time.

use crate::bus::MessageBus;
use crate::envelope::EventEnvelope;
use crate::error::{OutboxError, OutboxResult};
use crate::outbox::Outbox;
use docket_core::{Clock, CollectionPath, Database, SystemClock, UnitOfWork};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Configuration for an [`OutboxWorker`].
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Collection holding the outbox events.
    pub outbox: CollectionPath,
    /// Delete events once published instead of marking them sent.
    pub delete_on_publish: bool,
    /// Stop a drain after this many events.
    pub max_events: Option<usize>,
}

impl WorkerConfig {
    /// Creates a configuration for the outbox at `outbox`.
    pub fn new(outbox: CollectionPath) -> Self {
        Self {
            outbox,
            delete_on_publish: false,
            max_events: None,
        }
    }

    /// Sets whether published events are deleted.
    pub fn with_delete_on_publish(mut self, delete: bool) -> Self {
        self.delete_on_publish = delete;
        self
    }

    /// Limits how many events one drain publishes.
    pub fn with_max_events(mut self, max: usize) -> Self {
        self.max_events = Some(max);
        self
    }
}

/// Counters across the lifetime of a worker.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerStats {
    /// Events published and committed as sent.
    pub events_published: u64,
    /// Passes that ended in an error.
    pub failed_passes: u64,
    /// Last error message.
    pub last_error: Option<String>,
}

/// Outcome of [`OutboxWorker::drain`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Ids of the published events, in publication order.
    pub published: Vec<String>,
}

impl DrainReport {
    /// Returns the number of published events.
    pub fn len(&self) -> usize {
        self.published.len()
    }

    /// Returns true if nothing was published.
    pub fn is_empty(&self) -> bool {
        self.published.is_empty()
    }
}

/// Drives the outbox: each pass reads the oldest unsent event, publishes it
/// and marks it sent, all in one unit of work.
///
/// A failed publish aborts the pass before the mark, so the event stays
/// eligible. A publish followed by a failed commit leaves the event unsent
/// and the next pass publishes it again: delivery is at-least-once.
pub struct OutboxWorker<D, B> {
    uow: UnitOfWork<D>,
    bus: B,
    config: WorkerConfig,
    clock: Arc<dyn Clock>,
    stats: RwLock<WorkerStats>,
}

impl<D: Database, B: MessageBus> OutboxWorker<D, B> {
    /// Creates a worker publishing from `db` to `bus`.
    pub fn new(db: D, bus: B, config: WorkerConfig) -> Self {
        Self {
            uow: UnitOfWork::new(db),
            bus,
            config,
            clock: Arc::new(SystemClock),
            stats: RwLock::new(WorkerStats::default()),
        }
    }

    /// Sets the clock used for `timeSent`.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Returns the configuration.
    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Returns the bus.
    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// Returns the lifetime counters.
    pub fn stats(&self) -> WorkerStats {
        self.stats.read().clone()
    }

    /// Publishes the oldest unsent event.
    ///
    /// Returns the event id, or `None` if the outbox is drained.
    ///
    /// # Errors
    ///
    /// Propagates read, publish and commit failures; the event then remains
    /// eligible for the next pass.
    pub fn process_next(&self) -> OutboxResult<Option<String>> {
        let result = self.publish_one();
        let mut stats = self.stats.write();
        match &result {
            Ok(Some(_)) => stats.events_published += 1,
            Ok(None) => {}
            Err(err) => {
                warn!(error = %err, outbox = %self.config.outbox, "outbox pass failed");
                stats.failed_passes += 1;
                stats.last_error = Some(err.to_string());
            }
        }
        result
    }

    fn publish_one(&self) -> OutboxResult<Option<String>> {
        let mut outbox = Outbox::new(self.config.outbox.clone()).with_clock(Arc::clone(&self.clock));
        let delete = self.config.delete_on_publish;

        let committed = self.uow.commit(&mut outbox, |coordinator, outbox| {
            let Some(event) = outbox.next_to_send(coordinator)? else {
                return Ok::<_, OutboxError>(None);
            };
            let envelope = EventEnvelope::from_event(&event, self.clock.now())?;
            self.bus.publish(&event.topic, &envelope)?;
            debug!(event = %event.id, topic = %event.topic, "published to bus");

            let id = event.id.clone();
            if delete {
                outbox.discard(event);
            } else {
                outbox.mark_sent(event);
            }
            Ok(Some(id))
        })?;

        if let Some(id) = &committed.value {
            info!(event = %id, attempts = committed.attempts, "outbox event sent");
        }
        Ok(committed.value)
    }

    /// Publishes events until the outbox is drained or `max_events` is
    /// reached.
    ///
    /// # Errors
    ///
    /// Stops at the first failed pass and returns its error; events
    /// published before it stay published.
    pub fn drain(&self) -> OutboxResult<DrainReport> {
        let mut report = DrainReport::default();
        loop {
            if self.config.max_events.is_some_and(|max| report.len() >= max) {
                debug!(published = report.len(), "drain limit reached");
                break;
            }
            match self.process_next()? {
                Some(id) => report.published.push(id),
                None => {
                    debug!(published = report.len(), "outbox drained");
                    break;
                }
            }
        }
        Ok(report)
    }
}
