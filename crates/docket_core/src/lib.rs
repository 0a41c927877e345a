//! # Docket Core
//!
//! Transaction-scoped persistence for document databases.
//!
//! This crate provides:
//! - [`ChangeTracker`]: dirty checking of intended writes against reads
//! - [`EntitySet`] and [`Repository`]: entity lifecycle tracking
//! - [`TransactionCoordinator`] and [`UnitOfWork`]: retry-safe commits that
//!   only write what changed
//! - [`Database`] and [`DocumentTransaction`]: the collaborator interface,
//!   with [`InMemoryDatabase`] for tests
//!
//! ## Example
//!
//! ```rust
//! use docket_core::{
//!     CollectionPath, CoreResult, DocumentWrite, EntitySet, FieldWrite, Identifiable,
//!     InMemoryDatabase, Repository, UnitOfWork, WriteData,
//! };
//!
//! #[derive(Clone)]
//! struct User {
//!     id: String,
//!     name: String,
//! }
//!
//! impl Identifiable for User {
//!     fn id(&self) -> &str {
//!         &self.id
//!     }
//! }
//!
//! struct Users(EntitySet<User>);
//!
//! impl Repository for Users {
//!     type Entity = User;
//!
//!     fn entities(&self) -> &EntitySet<User> {
//!         &self.0
//!     }
//!
//!     fn entities_mut(&mut self) -> &mut EntitySet<User> {
//!         &mut self.0
//!     }
//!
//!     fn to_documents(&self, user: &User) -> CoreResult<Vec<DocumentWrite>> {
//!         let path = CollectionPath::new("users")?.doc(&user.id)?;
//!         let data = WriteData::from([("name".to_string(), FieldWrite::set(user.name.as_str()))]);
//!         Ok(vec![DocumentWrite::new(path, data)])
//!     }
//! }
//!
//! let uow = UnitOfWork::new(InMemoryDatabase::new());
//! let mut users = Users(EntitySet::new());
//! let committed = uow
//!     .commit(&mut users, |_, users| -> CoreResult<()> {
//!         users.add(User { id: "u1".into(), name: "Ada".into() });
//!         Ok(())
//!     })
//!     .unwrap();
//! assert_eq!(committed.summary.created, 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod coordinator;
mod database;
mod document;
mod entity;
mod error;
mod ids;
mod memory;
mod operation;
mod path;
mod repository;
mod tracker;
mod unit_of_work;

pub use config::TransactionConfig;
pub use coordinator::{CommitSummary, TransactionCoordinator};
pub use database::{
    Database, Direction, DocumentTransaction, Filter, FilterOp, OrderBy, Query, Write,
};
pub use document::{
    apply_patch, blind_patch, creatable, write_data, Document, DocumentWrite, FieldPatch,
    FieldWrite, Patch, Snapshot, WriteData,
};
pub use entity::{EntitySet, Identifiable, TrackedEntity, TrackingMode};
pub use error::{CoreError, CoreResult};
pub use ids::{Clock, IdGenerator, ManualClock, SequentialIds, SystemClock, UuidGenerator};
pub use memory::InMemoryDatabase;
pub use operation::{OpType, Operation};
pub use path::{CollectionPath, DocumentPath};
pub use repository::{Repository, RepositorySet};
pub use tracker::ChangeTracker;
pub use unit_of_work::{Committed, DirectReader, UnitOfWork};

pub use docket_codec::{Timestamp, Value};
