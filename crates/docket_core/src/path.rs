//! Document and collection paths.

use crate::error::{CoreError, CoreResult};
use std::fmt;

fn segments(path: &str) -> CoreResult<Vec<&str>> {
    if path.is_empty() {
        return Err(CoreError::invalid_path(path, "path is empty"));
    }
    let parts: Vec<&str> = path.split('/').collect();
    if parts.iter().any(|s| s.is_empty()) {
        return Err(CoreError::invalid_path(path, "path has an empty segment"));
    }
    Ok(parts)
}

/// Path of a single document, e.g. `orders/o-1` or `orders/o-1/lines/l-2`.
///
/// Always an even, non-zero number of segments.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DocumentPath(String);

impl DocumentPath {
    /// Parses a document path.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidPath`] if the segment count is odd or a
    /// segment is empty.
    pub fn new(path: impl Into<String>) -> CoreResult<Self> {
        let path = path.into();
        if segments(&path)?.len() % 2 != 0 {
            return Err(CoreError::invalid_path(
                path,
                "document paths need an even number of segments",
            ));
        }
        Ok(Self(path))
    }

    /// Returns the path as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the last segment (the document id).
    #[must_use]
    pub fn id(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// Returns the collection containing this document.
    #[must_use]
    pub fn parent(&self) -> CollectionPath {
        match self.0.rsplit_once('/') {
            Some((parent, _)) => CollectionPath(parent.to_string()),
            None => CollectionPath(String::new()),
        }
    }

    /// Returns a sub-collection below this document.
    ///
    /// # Errors
    ///
    /// Fails if `name` is empty or contains a `/`.
    pub fn collection(&self, name: &str) -> CoreResult<CollectionPath> {
        CollectionPath::new(format!("{}/{name}", self.0))
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DocumentPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Path of a collection, e.g. `outbox` or `orders/o-1/lines`.
///
/// Always an odd number of segments.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CollectionPath(String);

impl CollectionPath {
    /// Parses a collection path.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidPath`] if the segment count is even or a
    /// segment is empty.
    pub fn new(path: impl Into<String>) -> CoreResult<Self> {
        let path = path.into();
        if segments(&path)?.len() % 2 == 0 {
            return Err(CoreError::invalid_path(
                path,
                "collection paths need an odd number of segments",
            ));
        }
        Ok(Self(path))
    }

    /// Returns the path as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the path of the document `id` in this collection.
    ///
    /// # Errors
    ///
    /// Fails if `id` is empty or contains a `/`.
    pub fn doc(&self, id: &str) -> CoreResult<DocumentPath> {
        if id.is_empty() || id.contains('/') {
            return Err(CoreError::invalid_path(
                format!("{}/{id}", self.0),
                "document id must be a single non-empty segment",
            ));
        }
        Ok(DocumentPath(format!("{}/{id}", self.0)))
    }

    /// Returns true if `doc` is a direct child of this collection.
    #[must_use]
    pub fn contains(&self, doc: &DocumentPath) -> bool {
        doc.parent() == *self
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_path_segments() {
        let path = DocumentPath::new("orders/o-1/lines/l-2").unwrap();
        assert_eq!(path.id(), "l-2");
        assert_eq!(path.parent().as_str(), "orders/o-1/lines");
    }

    #[test]
    fn document_path_rejects_odd_segments() {
        assert!(matches!(
            DocumentPath::new("orders"),
            Err(CoreError::InvalidPath { .. })
        ));
        assert!(DocumentPath::new("orders//x").is_err());
        assert!(DocumentPath::new("").is_err());
    }

    #[test]
    fn collection_path_rejects_even_segments() {
        assert!(CollectionPath::new("outbox").is_ok());
        assert!(CollectionPath::new("tenants/t1/outbox").is_ok());
        assert!(CollectionPath::new("tenants/t1").is_err());
    }

    #[test]
    fn doc_builds_child_path() {
        let outbox = CollectionPath::new("outbox").unwrap();
        let doc = outbox.doc("evt-1").unwrap();
        assert_eq!(doc.as_str(), "outbox/evt-1");
        assert!(outbox.contains(&doc));
        assert!(outbox.doc("a/b").is_err());
    }

    #[test]
    fn nested_collection_does_not_contain_grandchildren() {
        let orders = CollectionPath::new("orders").unwrap();
        let line = DocumentPath::new("orders/o-1/lines/l-1").unwrap();
        assert!(!orders.contains(&line));
        let lines = DocumentPath::new("orders/o-1").unwrap().collection("lines").unwrap();
        assert!(lines.contains(&line));
    }
}
