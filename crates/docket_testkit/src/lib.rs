//! # Docket Testkit
//!
//! Test utilities for Docket.
//!
//! This crate provides:
//! - Fixture entities and repositories, including a multi-document aggregate
//! - [`TestContext`]: an in-memory database with a manual clock and
//!   deterministic ids
//! - Property-based test generators using proptest
//! - [`init_tracing`] for log output in tests
//!
//! Cross-crate integration tests live in this crate's `tests/` directory.
//!
//! ## Usage
//!
//! ```rust
//! use docket_core::{CoreResult, Repository};
//! use docket_testkit::prelude::*;
//!
//! let ctx = TestContext::new();
//! let mut customers = CustomerRepo::new();
//! ctx.uow()
//!     .commit(&mut customers, |_, customers| -> CoreResult<()> {
//!         customers.add(Customer::new("c1", "Ada"));
//!         Ok(())
//!     })
//!     .unwrap();
//! assert!(ctx.db.document(&customer_path("c1")).is_some());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod logging;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::logging::*;
}

pub use fixtures::*;
pub use generators::*;
pub use logging::*;
