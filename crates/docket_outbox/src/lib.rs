//! # Docket Outbox
//!
//! Reliable messaging on top of `docket_core` units of work.
//!
//! - [`Outbox`] stores outgoing messages in the same transaction as the
//!   business change that produced them.
//! - [`OutboxWorker`] publishes them to a [`MessageBus`], one event per
//!   transaction, with at-least-once delivery.
//! - [`Inbox`] is an idempotency ledger for consumers: record an inbound
//!   event id in the same transaction as its side effects.
//!
//! ## Example
//!
//! ```rust
//! use docket_codec::Value;
//! use docket_core::{CollectionPath, CoreResult, InMemoryDatabase, UnitOfWork};
//! use docket_outbox::{InMemoryBus, Outbox, OutboxWorker, WorkerConfig};
//!
//! let db = InMemoryDatabase::new();
//! let outbox_path = CollectionPath::new("outbox").unwrap();
//!
//! let uow = UnitOfWork::new(&db);
//! let mut outbox = Outbox::new(outbox_path.clone());
//! uow.commit(&mut outbox, |_, outbox| -> CoreResult<()> {
//!     outbox.queue(Value::from("hello"), "greetings");
//!     Ok(())
//! })
//! .unwrap();
//!
//! let worker = OutboxWorker::new(&db, InMemoryBus::new(), WorkerConfig::new(outbox_path));
//! let report = worker.drain().unwrap();
//! assert_eq!(report.len(), 1);
//! assert_eq!(worker.bus().published_to("greetings").len(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod bus;
mod envelope;
mod error;
mod event;
mod fields;
mod inbox;
mod outbox;
mod worker;

pub use bus::{InMemoryBus, MessageBus};
pub use envelope::EventEnvelope;
pub use error::{BusError, OutboxError, OutboxResult};
pub use event::OutboxEvent;
pub use inbox::{Inbox, InboxRecord};
pub use outbox::Outbox;
pub use worker::{DrainReport, OutboxWorker, WorkerConfig, WorkerStats};
