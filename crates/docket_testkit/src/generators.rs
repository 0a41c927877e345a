//! Property-based test generators using proptest.
//!
//! Strategies produce values the way the database would return them:
//! finite floats, timestamps in either representation, and nested
//! arrays and maps of bounded depth.

use chrono::{DateTime, Utc};
use docket_codec::{Timestamp, Value};
use docket_core::Document;
use proptest::prelude::*;

/// Strategy for top-level field names.
pub fn field_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-zA-Z0-9]{0,7}").expect("Invalid regex")
}

/// Strategy for instants between 1970 and 2100, whole microseconds.
pub fn instant_strategy() -> impl Strategy<Value = DateTime<Utc>> {
    (0i64..4_102_444_800, 0u32..1_000_000).prop_map(|(secs, micros)| {
        DateTime::from_timestamp(secs, micros * 1_000).unwrap_or_default()
    })
}

/// Strategy for timestamps in either representation.
pub fn timestamp_strategy() -> impl Strategy<Value = Timestamp> {
    (instant_strategy(), any::<bool>()).prop_map(|(time, native)| {
        if native {
            Timestamp::native_from(time)
        } else {
            Timestamp::from_utc(time)
        }
    })
}

/// Strategy for leaf values.
pub fn scalar_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Integer),
        (-1.0e12f64..1.0e12).prop_map(Value::Float),
        prop::string::string_regex("[a-zA-Z0-9 ]{0,12}")
            .expect("Invalid regex")
            .prop_map(Value::Text),
        timestamp_strategy().prop_map(Value::Instant),
    ]
}

/// Strategy for arbitrary values, nested up to three levels.
pub fn value_strategy() -> impl Strategy<Value = Value> {
    scalar_strategy().prop_recursive(3, 32, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map(field_name_strategy(), inner, 0..4).prop_map(Value::Map),
        ]
    })
}

/// Strategy for stored documents.
pub fn document_strategy() -> impl Strategy<Value = Document> {
    prop::collection::btree_map(field_name_strategy(), value_strategy(), 0..6)
}

/// Returns the same instant in the other representation.
pub fn flip_representation(value: &Value) -> Value {
    match value {
        Value::Instant(t) => match t.to_utc() {
            Ok(time) => match t {
                Timestamp::Native { .. } => Value::Instant(Timestamp::from_utc(time)),
                Timestamp::Calendar(_) => Value::Instant(Timestamp::native_from(time)),
            },
            Err(_) => value.clone(),
        },
        Value::Array(items) => Value::Array(items.iter().map(flip_representation).collect()),
        Value::Map(fields) => Value::Map(
            fields
                .iter()
                .map(|(k, v)| (k.clone(), flip_representation(v)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Lifecycle call applied to an entity set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleCall {
    /// `add`
    Add,
    /// `remove`
    Remove,
    /// `track`
    Track,
}

/// Strategy for lifecycle calls on a small pool of ids.
pub fn lifecycle_strategy(max_calls: usize) -> impl Strategy<Value = Vec<(LifecycleCall, u8)>> {
    let call = prop_oneof![
        Just(LifecycleCall::Add),
        Just(LifecycleCall::Remove),
        Just(LifecycleCall::Track),
    ];
    prop::collection::vec((call, 0u8..4), 0..max_calls)
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Creates a configuration for thorough tests.
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            cases: 1024,
            max_shrink_iters: 10000,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}
