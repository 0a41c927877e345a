//! # Docket Codec
//!
//! Document value model for Docket.
//!
//! Every field read from or written to the document database is a [`Value`]:
//! a small recursive tagged union (null, bool, numbers, text, instants,
//! arrays, maps). Change detection in `docket_core` is written once against
//! this type.
//!
//! ## Equality
//!
//! [`Value`] equality is structural and representation-independent:
//! - instants compare by the moment they denote ([`Timestamp`])
//! - map key order never matters
//! - arrays compare positionally
//!
//! ## Usage
//!
//! ```
//! use docket_codec::{Timestamp, Value};
//!
//! let read = Value::map([("at", Value::Instant(Timestamp::native(1_700_000_000, 0)))]);
//! let json = read.to_json().unwrap();
//! assert_eq!(json["at"], "2023-11-14T22:13:20Z");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod json;
mod timestamp;
mod value;

pub use error::{CodecError, CodecResult};
pub use timestamp::Timestamp;
pub use value::Value;
