//! Document data, intended writes and merge patches.

use crate::error::{CoreError, CoreResult};
use crate::path::DocumentPath;
use docket_codec::Value;
use std::collections::BTreeMap;

/// Field data of a stored document.
pub type Document = BTreeMap<String, Value>;

/// Intended value of one top-level field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldWrite {
    /// Write this value.
    Set(Value),
    /// Remove the field if it is present.
    Unset,
}

impl FieldWrite {
    /// Creates a write that sets `value`.
    pub fn set(value: impl Into<Value>) -> Self {
        FieldWrite::Set(value.into())
    }

    /// Returns the value being set, if any.
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            FieldWrite::Set(v) => Some(v),
            FieldWrite::Unset => None,
        }
    }
}

impl From<Value> for FieldWrite {
    fn from(value: Value) -> Self {
        FieldWrite::Set(value)
    }
}

/// Intended final state of a document, field by field.
pub type WriteData = BTreeMap<String, FieldWrite>;

/// Lifts stored field data into write data that sets every field.
pub fn write_data(document: Document) -> WriteData {
    document
        .into_iter()
        .map(|(k, v)| (k, FieldWrite::Set(v)))
        .collect()
}

/// Drops `Unset` fields, yielding the data a freshly created document holds.
pub fn creatable(data: WriteData) -> Document {
    data.into_iter()
        .filter_map(|(k, w)| match w {
            FieldWrite::Set(v) => Some((k, v)),
            FieldWrite::Unset => None,
        })
        .collect()
}

/// One field of a partial merge-write.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldPatch {
    /// Replace the field with this value.
    Set(Value),
    /// Deletion sentinel: remove the field.
    Delete,
}

/// A partial merge-write: only the listed fields change.
pub type Patch = BTreeMap<String, FieldPatch>;

/// Converts write data to a blind merge patch (every `Unset` becomes a
/// deletion sentinel).
pub fn blind_patch(data: WriteData) -> Patch {
    data.into_iter()
        .map(|(k, w)| match w {
            FieldWrite::Set(v) => (k, FieldPatch::Set(v)),
            FieldWrite::Unset => (k, FieldPatch::Delete),
        })
        .collect()
}

/// Applies a merge patch to stored field data.
pub fn apply_patch(target: &mut Document, patch: Patch) {
    for (key, field) in patch {
        match field {
            FieldPatch::Set(v) => {
                target.insert(key, v);
            }
            FieldPatch::Delete => {
                target.remove(&key);
            }
        }
    }
}

/// Result of reading one document.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// Path that was read.
    pub path: DocumentPath,
    /// Field data, `None` if the document does not exist.
    pub data: Option<Document>,
}

impl Snapshot {
    /// Creates a snapshot of an existing document.
    pub fn found(path: DocumentPath, data: Document) -> Self {
        Self {
            path,
            data: Some(data),
        }
    }

    /// Creates a snapshot of a missing document.
    pub fn missing(path: DocumentPath) -> Self {
        Self { path, data: None }
    }

    /// Returns true if the document exists.
    pub fn exists(&self) -> bool {
        self.data.is_some()
    }

    /// Returns the field data, if the document exists.
    pub fn data(&self) -> Option<&Document> {
        self.data.as_ref()
    }

    /// Returns the field data.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] if the document does not exist.
    pub fn into_data(self) -> CoreResult<Document> {
        match self.data {
            Some(data) => Ok(data),
            None => Err(CoreError::not_found(format!(
                "document at {} doesn't exist",
                self.path
            ))),
        }
    }
}

/// One stored document produced by projecting an entity.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentWrite {
    /// Target document.
    pub path: DocumentPath,
    /// Intended field data.
    pub data: WriteData,
}

impl DocumentWrite {
    /// Creates a document write.
    pub fn new(path: DocumentPath, data: WriteData) -> Self {
        Self { path, data }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path() -> DocumentPath {
        DocumentPath::new("items/i-1").unwrap()
    }

    #[test]
    fn creatable_drops_unset_fields() {
        let data = WriteData::from([
            ("a".to_string(), FieldWrite::set(1)),
            ("b".to_string(), FieldWrite::Unset),
        ]);
        let doc = creatable(data);
        assert_eq!(doc.len(), 1);
        assert_eq!(doc.get("a"), Some(&Value::from(1)));
    }

    #[test]
    fn blind_patch_turns_unset_into_delete() {
        let data = WriteData::from([("gone".to_string(), FieldWrite::Unset)]);
        assert_eq!(blind_patch(data).get("gone"), Some(&FieldPatch::Delete));
    }

    #[test]
    fn apply_patch_sets_and_deletes() {
        let mut doc = Document::from([
            ("keep".to_string(), Value::from(1)),
            ("drop".to_string(), Value::from(2)),
        ]);
        apply_patch(
            &mut doc,
            Patch::from([
                ("drop".to_string(), FieldPatch::Delete),
                ("new".to_string(), FieldPatch::Set(Value::from("x"))),
            ]),
        );
        assert_eq!(doc.len(), 2);
        assert!(doc.contains_key("keep"));
        assert!(doc.contains_key("new"));
    }

    #[test]
    fn missing_snapshot_into_data_is_not_found() {
        let err = Snapshot::missing(path()).into_data().unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn found_snapshot_exposes_data() {
        let snap = Snapshot::found(path(), Document::new());
        assert!(snap.exists());
        assert!(snap.into_data().unwrap().is_empty());
    }
}
