//! The document database collaborator.
//!
//! Docket does not implement a database; it drives one through these traits.
//! [`crate::InMemoryDatabase`] is the reference implementation used in tests.

use crate::document::{Document, Patch, Snapshot};
use crate::error::{CoreError, CoreResult};
use crate::path::{CollectionPath, DocumentPath};
use docket_codec::Value;
use std::cmp::Ordering;
use std::mem;
use std::sync::Arc;

/// Comparison operator of a query filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    /// Field equals the value.
    Eq,
    /// Field is present and differs from the value.
    NotEq,
    /// Field is less than the value.
    Lt,
    /// Field is less than or equal to the value.
    Le,
    /// Field is greater than the value.
    Gt,
    /// Field is greater than or equal to the value.
    Ge,
}

/// One `field <op> value` condition.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    /// Top-level field name.
    pub field: String,
    /// Comparison operator.
    pub op: FilterOp,
    /// Right-hand side.
    pub value: Value,
}

impl Filter {
    /// Returns true if `document` satisfies this filter.
    ///
    /// Documents missing the field never match. Range operators only match
    /// values of the same kind (integers and floats count as one kind).
    pub fn matches(&self, document: &Document) -> bool {
        let Some(field) = document.get(&self.field) else {
            return false;
        };
        match self.op {
            FilterOp::Eq => field.equivalent(&self.value),
            FilterOp::NotEq => !field.equivalent(&self.value),
            op => {
                if !same_kind(field, &self.value) {
                    return false;
                }
                let ord = field.cmp_order(&self.value);
                match op {
                    FilterOp::Lt => ord == Ordering::Less,
                    FilterOp::Le => ord != Ordering::Greater,
                    FilterOp::Gt => ord == Ordering::Greater,
                    _ => ord != Ordering::Less,
                }
            }
        }
    }
}

fn same_kind(a: &Value, b: &Value) -> bool {
    (a.as_f64().is_some() && b.as_f64().is_some()) || mem::discriminant(a) == mem::discriminant(b)
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    /// Smallest first.
    #[default]
    Ascending,
    /// Largest first.
    Descending,
}

/// One sort key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    /// Top-level field name.
    pub field: String,
    /// Sort direction.
    pub direction: Direction,
}

/// A query over the direct children of one collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    /// Collection to scan.
    pub collection: CollectionPath,
    /// All filters must match.
    pub filters: Vec<Filter>,
    /// Sort keys, most significant first.
    pub order_by: Vec<OrderBy>,
    /// Maximum number of results.
    pub limit: Option<usize>,
}

impl Query {
    /// Starts a query over `collection`.
    pub fn collection(collection: CollectionPath) -> Self {
        Self {
            collection,
            filters: Vec::new(),
            order_by: Vec::new(),
            limit: None,
        }
    }

    /// Adds a filter.
    pub fn filter(mut self, field: impl Into<String>, op: FilterOp, value: impl Into<Value>) -> Self {
        self.filters.push(Filter {
            field: field.into(),
            op,
            value: value.into(),
        });
        self
    }

    /// Adds an equality filter.
    pub fn where_eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(field, FilterOp::Eq, value)
    }

    /// Adds a sort key.
    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order_by.push(OrderBy {
            field: field.into(),
            direction,
        });
        self
    }

    /// Limits the number of results.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Returns true if the document at `path` belongs in the result set.
    ///
    /// Documents missing an `order_by` field are excluded.
    pub fn matches(&self, path: &DocumentPath, document: &Document) -> bool {
        self.collection.contains(path)
            && self.filters.iter().all(|f| f.matches(document))
            && self.order_by.iter().all(|o| document.contains_key(&o.field))
    }

    /// Compares two matching documents by the sort keys, then by path.
    pub fn compare(&self, a: &Snapshot, b: &Snapshot) -> Ordering {
        let (Some(da), Some(db)) = (a.data(), b.data()) else {
            return a.path.cmp(&b.path);
        };
        for key in &self.order_by {
            let ord = match (da.get(&key.field), db.get(&key.field)) {
                (Some(x), Some(y)) => x.cmp_order(y),
                _ => Ordering::Equal,
            };
            let ord = match key.direction {
                Direction::Ascending => ord,
                Direction::Descending => ord.reverse(),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        a.path.cmp(&b.path)
    }
}

/// One attempt of a database transaction.
///
/// Reads take `&mut self` because implementations record what was read to
/// validate it at commit.
pub trait DocumentTransaction {
    /// Reads one document.
    fn get(&mut self, path: &DocumentPath) -> CoreResult<Snapshot>;

    /// Runs a query; every returned snapshot exists.
    fn query(&mut self, query: &Query) -> CoreResult<Vec<Snapshot>>;

    /// Creates a document.
    ///
    /// # Errors
    ///
    /// Fails with [`CoreError::Conflict`] if the document already exists.
    fn create(&mut self, path: &DocumentPath, data: Document) -> CoreResult<()>;

    /// Deletes a document. Deleting a missing document is not an error.
    fn delete(&mut self, path: &DocumentPath) -> CoreResult<()>;

    /// Merge-writes `patch` into a document, creating it if missing.
    fn merge(&mut self, path: &DocumentPath, patch: Patch) -> CoreResult<()>;
}

/// A write issued outside a transaction.
#[derive(Debug, Clone, PartialEq)]
pub enum Write {
    /// Create a document; fails if it exists.
    Create {
        /// Target document.
        path: DocumentPath,
        /// Field data.
        data: Document,
    },
    /// Delete a document.
    Delete {
        /// Target document.
        path: DocumentPath,
    },
    /// Merge-write into a document.
    Merge {
        /// Target document.
        path: DocumentPath,
        /// Changed fields.
        patch: Patch,
    },
}

impl Write {
    /// Returns the target document.
    pub fn path(&self) -> &DocumentPath {
        match self {
            Write::Create { path, .. } | Write::Delete { path } | Write::Merge { path, .. } => path,
        }
    }
}

/// A transactional document database.
pub trait Database {
    /// Runs `body` in a transaction and commits its writes.
    ///
    /// On contention the database discards the attempt and runs `body`
    /// again against a fresh transaction, so `body` must not leak state
    /// between attempts. An error returned by `body` aborts without retry.
    ///
    /// # Errors
    ///
    /// Returns the body's error, or a [`CoreError`] from the commit
    /// (converted into `E`).
    fn run_transaction<T, E, F>(&self, body: F) -> Result<T, E>
    where
        F: FnMut(&mut dyn DocumentTransaction) -> Result<T, E>,
        E: From<CoreError>;

    /// Reads one document outside any transaction.
    fn get(&self, path: &DocumentPath) -> CoreResult<Snapshot>;

    /// Runs a query outside any transaction.
    fn query(&self, query: &Query) -> CoreResult<Vec<Snapshot>>;

    /// Applies writes outside any transaction.
    fn apply(&self, writes: Vec<Write>) -> CoreResult<()>;
}

macro_rules! forward_database {
    ($($ty:ty),+) => {
        $(
            impl<D: Database> Database for $ty {
                fn run_transaction<T, E, F>(&self, body: F) -> Result<T, E>
                where
                    F: FnMut(&mut dyn DocumentTransaction) -> Result<T, E>,
                    E: From<CoreError>,
                {
                    (**self).run_transaction(body)
                }

                fn get(&self, path: &DocumentPath) -> CoreResult<Snapshot> {
                    (**self).get(path)
                }

                fn query(&self, query: &Query) -> CoreResult<Vec<Snapshot>> {
                    (**self).query(query)
                }

                fn apply(&self, writes: Vec<Write>) -> CoreResult<()> {
                    (**self).apply(writes)
                }
            }
        )+
    };
}

forward_database!(&D, Arc<D>);
