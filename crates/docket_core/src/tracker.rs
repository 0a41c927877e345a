//! Read tracking and dirty checking.
//!
//! The [`ChangeTracker`] remembers the field data observed by every read in
//! the current transaction attempt. At commit time an intended write is
//! diffed against that snapshot so only the fields that actually changed are
//! sent to the database.
//!
//! ## Diff rules
//!
//! For each top-level key of the intended write:
//! - `Unset` with a recorded value: emit [`FieldPatch::Delete`]
//! - `Unset` with no recorded value: omit the key
//! - otherwise compare recorded and intended values with
//!   [`docket_codec::Value::equivalent`]; on any difference emit the *whole* intended
//!   value (nested maps are replaced, never field-merged)
//!
//! Keys that are absent from the intended write are never emitted.

use crate::document::{Document, FieldPatch, FieldWrite, Patch, WriteData};
use crate::path::DocumentPath;
use std::collections::HashMap;
use tracing::trace;

/// Tracks document reads within one transaction attempt.
#[derive(Debug, Default)]
pub struct ChangeTracker {
    /// Document path -> field data at the most recent read.
    reads: HashMap<DocumentPath, Document>,
}

impl ChangeTracker {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the data read at `path`, replacing any earlier read.
    ///
    /// A read of a missing document is recorded as an empty document.
    pub fn track(&mut self, path: &DocumentPath, data: Option<&Document>) {
        trace!(path = %path, exists = data.is_some(), "tracking read");
        self.reads
            .insert(path.clone(), data.cloned().unwrap_or_default());
    }

    /// Forgets every recorded read.
    pub fn reset(&mut self) {
        self.reads.clear();
    }

    /// Returns true if `path` was read in this attempt.
    #[must_use]
    pub fn is_tracked(&self, path: &DocumentPath) -> bool {
        self.reads.contains_key(path)
    }

    /// Returns the data recorded for `path`.
    #[must_use]
    pub fn recorded(&self, path: &DocumentPath) -> Option<&Document> {
        self.reads.get(path)
    }

    /// Returns the number of tracked paths.
    #[must_use]
    pub fn len(&self) -> usize {
        self.reads.len()
    }

    /// Returns true if nothing has been tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.reads.is_empty()
    }

    /// Computes the minimal merge patch turning the recorded read of `path`
    /// into `write`.
    ///
    /// Returns `None` when nothing changed; the caller must then skip the
    /// write entirely. An untracked path is diffed against an empty document.
    #[must_use]
    pub fn diff(&self, path: &DocumentPath, write: &WriteData) -> Option<Patch> {
        let empty = Document::new();
        let read = self.reads.get(path).unwrap_or(&empty);

        let mut patch = Patch::new();
        for (key, intended) in write {
            let recorded = read.get(key);
            match intended {
                FieldWrite::Unset => {
                    if recorded.is_some() {
                        patch.insert(key.clone(), FieldPatch::Delete);
                    }
                }
                FieldWrite::Set(value) => {
                    if !recorded.is_some_and(|r| r.equivalent(value)) {
                        patch.insert(key.clone(), FieldPatch::Set(value.clone()));
                    }
                }
            }
        }

        if patch.is_empty() {
            trace!(path = %path, "no changes");
            None
        } else {
            trace!(path = %path, fields = patch.len(), "changed fields");
            Some(patch)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use docket_codec::{Timestamp, Value};

    fn p() -> DocumentPath {
        DocumentPath::new("things/p").unwrap()
    }

    fn doc<const N: usize>(fields: [(&str, Value); N]) -> Document {
        fields
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }

    fn write<const N: usize>(fields: [(&str, FieldWrite); N]) -> WriteData {
        fields
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }

    #[test]
    fn identical_data_has_no_changes() {
        let mut tracker = ChangeTracker::new();
        let data = doc([
            ("stringField", Value::from("someString")),
            ("boolField", Value::from(true)),
            ("numField", Value::from(100)),
        ]);
        tracker.track(&p(), Some(&data));

        for _ in 0..3 {
            assert_eq!(
                tracker.diff(&p(), &crate::document::write_data(data.clone())),
                None
            );
        }
    }

    #[test]
    fn reset_forgets_reads() {
        let mut tracker = ChangeTracker::new();
        let data = doc([("a", Value::from(1)), ("b", Value::from("x"))]);
        tracker.track(&p(), Some(&data));
        tracker.reset();

        assert!(tracker.is_empty());
        let patch = tracker
            .diff(&p(), &crate::document::write_data(data))
            .unwrap();
        assert_eq!(patch.len(), 2);
        assert_eq!(patch.get("a"), Some(&FieldPatch::Set(Value::from(1))));
    }

    #[test]
    fn unset_of_absent_field_is_no_change() {
        let mut tracker = ChangeTracker::new();
        tracker.track(&p(), Some(&Document::new()));
        assert_eq!(tracker.diff(&p(), &write([("a", FieldWrite::Unset)])), None);
    }

    #[test]
    fn unset_of_present_field_emits_delete() {
        let mut tracker = ChangeTracker::new();
        tracker.track(&p(), Some(&doc([("a", Value::from("x"))])));
        let patch = tracker.diff(&p(), &write([("a", FieldWrite::Unset)])).unwrap();
        assert_eq!(patch, Patch::from([("a".to_string(), FieldPatch::Delete)]));
    }

    #[test]
    fn unset_of_null_field_emits_delete() {
        let mut tracker = ChangeTracker::new();
        tracker.track(&p(), Some(&doc([("a", Value::Null)])));
        let patch = tracker.diff(&p(), &write([("a", FieldWrite::Unset)])).unwrap();
        assert_eq!(patch.get("a"), Some(&FieldPatch::Delete));
    }

    #[test]
    fn nested_change_replaces_whole_field() {
        let mut tracker = ChangeTracker::new();
        let read = Value::map([("x", Value::from(1)), ("y", Value::from(2))]);
        tracker.track(&p(), Some(&doc([("a", read)])));

        let intended = Value::map([
            ("x", Value::from(1)),
            ("y", Value::from(2)),
            ("z", Value::from(3)),
        ]);
        let patch = tracker
            .diff(&p(), &write([("a", FieldWrite::Set(intended.clone()))]))
            .unwrap();
        assert_eq!(patch.get("a"), Some(&FieldPatch::Set(intended)));
    }

    #[test]
    fn shorter_array_is_a_change() {
        let mut tracker = ChangeTracker::new();
        tracker.track(&p(), Some(&doc([("arr", Value::from(vec![1, 2, 3]))])));
        let patch = tracker
            .diff(&p(), &write([("arr", FieldWrite::set(vec![1, 2]))]))
            .unwrap();
        assert_eq!(patch.get("arr"), Some(&FieldPatch::Set(Value::from(vec![1, 2]))));
    }

    #[test]
    fn reordered_array_is_a_change() {
        let mut tracker = ChangeTracker::new();
        tracker.track(&p(), Some(&doc([("arr", Value::from(vec!["a", "b"]))])));
        assert!(tracker
            .diff(&p(), &write([("arr", FieldWrite::set(vec!["b", "a"]))]))
            .is_some());
    }

    #[test]
    fn only_changed_fields_are_emitted() {
        let mut tracker = ChangeTracker::new();
        tracker.track(
            &p(),
            Some(&doc([("same", Value::from(1)), ("changed", Value::from(1))])),
        );
        let patch = tracker
            .diff(
                &p(),
                &write([("same", FieldWrite::set(1)), ("changed", FieldWrite::set(2))]),
            )
            .unwrap();
        assert_eq!(patch.len(), 1);
        assert!(patch.contains_key("changed"));
    }

    #[test]
    fn fields_missing_from_write_are_never_emitted() {
        let mut tracker = ChangeTracker::new();
        tracker.track(
            &p(),
            Some(&doc([("kept", Value::from(1)), ("other", Value::from(2))])),
        );
        let patch = tracker.diff(&p(), &write([("kept", FieldWrite::set(5))])).unwrap();
        assert!(!patch.contains_key("other"));
    }

    #[test]
    fn null_and_value_differ() {
        let mut tracker = ChangeTracker::new();
        tracker.track(&p(), Some(&doc([("n", Value::Null)])));
        assert_eq!(tracker.diff(&p(), &write([("n", FieldWrite::Set(Value::Null))])), None);
        assert!(tracker.diff(&p(), &write([("n", FieldWrite::set(0))])).is_some());
    }

    #[test]
    fn large_integer_replacing_nearby_float_is_a_change() {
        let mut tracker = ChangeTracker::new();
        tracker.track(&p(), Some(&doc([("n", Value::Float(9_007_199_254_740_992.0))])));
        let patch = tracker
            .diff(&p(), &write([("n", FieldWrite::set(9_007_199_254_740_993_i64))]))
            .unwrap();
        assert_eq!(
            patch.get("n"),
            Some(&FieldPatch::Set(Value::Integer(9_007_199_254_740_993)))
        );
    }

    #[test]
    fn integer_stored_as_equal_float_is_unchanged() {
        let mut tracker = ChangeTracker::new();
        tracker.track(&p(), Some(&doc([("n", Value::Float(42.0))])));
        assert_eq!(tracker.diff(&p(), &write([("n", FieldWrite::set(42))])), None);
    }

    #[test]
    fn calendar_and_native_timestamps_are_unchanged() {
        let time = Utc.with_ymd_and_hms(2022, 1, 2, 3, 4, 5).unwrap();
        let mut tracker = ChangeTracker::new();
        tracker.track(
            &p(),
            Some(&doc([("at", Value::Instant(Timestamp::native_from(time)))])),
        );
        let intended = write([("at", FieldWrite::Set(Value::Instant(Timestamp::from_utc(time))))]);
        assert_eq!(tracker.diff(&p(), &intended), None);
    }

    #[test]
    fn later_read_overwrites_earlier() {
        let mut tracker = ChangeTracker::new();
        tracker.track(&p(), Some(&doc([("a", Value::from(1))])));
        tracker.track(&p(), Some(&doc([("a", Value::from(2))])));
        assert_eq!(tracker.len(), 1);
        assert_eq!(tracker.diff(&p(), &write([("a", FieldWrite::set(2))])), None);
    }

    #[test]
    fn missing_document_read_tracks_as_empty() {
        let mut tracker = ChangeTracker::new();
        tracker.track(&p(), None);
        assert!(tracker.is_tracked(&p()));
        assert!(tracker.diff(&p(), &write([("a", FieldWrite::set(1))])).is_some());
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        fn small_doc() -> impl Strategy<Value = Document> {
            prop::collection::btree_map("[a-d]", any::<i64>().prop_map(Value::from), 0..4)
        }

        proptest! {
            #[test]
            fn patch_only_names_written_keys(read in small_doc(), intended in small_doc()) {
                let mut tracker = ChangeTracker::new();
                tracker.track(&p(), Some(&read));
                let write = crate::document::write_data(intended.clone());
                match tracker.diff(&p(), &write) {
                    None => prop_assert!(intended.iter().all(|(k, v)| read.get(k) == Some(v))),
                    Some(patch) => {
                        prop_assert!(patch.keys().all(|k| intended.contains_key(k)));
                        prop_assert!(patch.values().all(|f| matches!(f, FieldPatch::Set(_))));
                    }
                }
            }
        }
    }
}
