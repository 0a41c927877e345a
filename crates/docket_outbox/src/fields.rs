//! Typed access to stored document fields.

use chrono::{DateTime, Utc};
use docket_codec::{CodecError, CodecResult, Timestamp, Value};
use docket_core::{Document, FieldWrite};

fn field<'a>(doc: &'a Document, key: &str) -> CodecResult<&'a Value> {
    doc.get(key)
        .ok_or_else(|| CodecError::invalid_structure(format!("missing field `{key}`")))
}

fn mistyped(key: &str, expected: &str) -> CodecError {
    CodecError::invalid_structure(format!("field `{key}` is not {expected}"))
}

pub(crate) fn text(doc: &Document, key: &str) -> CodecResult<String> {
    field(doc, key)?
        .as_text()
        .map(str::to_string)
        .ok_or_else(|| mistyped(key, "text"))
}

pub(crate) fn boolean(doc: &Document, key: &str) -> CodecResult<bool> {
    field(doc, key)?
        .as_bool()
        .ok_or_else(|| mistyped(key, "a boolean"))
}

pub(crate) fn instant(doc: &Document, key: &str) -> CodecResult<DateTime<Utc>> {
    field(doc, key)?
        .as_instant()
        .ok_or_else(|| mistyped(key, "an instant"))?
        .to_utc()
}

/// Missing and null fields both read as `None`.
pub(crate) fn optional_instant(doc: &Document, key: &str) -> CodecResult<Option<DateTime<Utc>>> {
    match doc.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(_) => instant(doc, key).map(Some),
    }
}

pub(crate) fn set_instant(time: DateTime<Utc>) -> FieldWrite {
    FieldWrite::Set(Value::Instant(Timestamp::from_utc(time)))
}
