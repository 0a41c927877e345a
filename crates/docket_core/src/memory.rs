//! In-memory document database for testing.

use crate::config::TransactionConfig;
use crate::database::{Database, DocumentTransaction, Query, Write};
use crate::document::{apply_patch, Document, Patch, Snapshot};
use crate::error::{CoreError, CoreResult};
use crate::path::DocumentPath;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use tracing::{debug, warn};

#[derive(Debug, Default, Clone)]
struct Store {
    docs: BTreeMap<DocumentPath, Document>,
    /// Last commit that touched each path. Survives deletion.
    versions: HashMap<DocumentPath, u64>,
    commits: u64,
}

impl Store {
    fn version(&self, path: &DocumentPath) -> u64 {
        self.versions.get(path).copied().unwrap_or(0)
    }

    fn snapshot(&self, path: &DocumentPath) -> Snapshot {
        match self.docs.get(path) {
            Some(data) => Snapshot::found(path.clone(), data.clone()),
            None => Snapshot::missing(path.clone()),
        }
    }

    fn query(&self, query: &Query) -> Vec<Snapshot> {
        let mut rows: Vec<Snapshot> = self
            .docs
            .iter()
            .filter(|(path, data)| query.matches(path, data))
            .map(|(path, data)| Snapshot::found(path.clone(), data.clone()))
            .collect();
        rows.sort_by(|a, b| query.compare(a, b));
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }
        rows
    }

    fn write(&mut self, write: Write) -> CoreResult<()> {
        let path = write.path().clone();
        match write {
            Write::Create { path, data } => {
                if self.docs.contains_key(&path) {
                    return Err(CoreError::conflict(path.as_str()));
                }
                self.docs.insert(path, data);
            }
            Write::Delete { path } => {
                self.docs.remove(&path);
            }
            Write::Merge { path, patch } => {
                apply_patch(self.docs.entry(path).or_default(), patch);
            }
        }
        self.versions.insert(path, self.commits);
        Ok(())
    }

    /// Applies `writes` as one commit, all or nothing.
    fn commit(&mut self, writes: Vec<Write>) -> CoreResult<()> {
        let mut next = self.clone();
        next.commits += 1;
        for write in writes {
            next.write(write)?;
        }
        *self = next;
        Ok(())
    }
}

/// An in-memory [`Database`] with optimistic transactions.
///
/// Transactions record the version of every document they read and buffer
/// their writes. At commit the read versions are validated; if another
/// writer got there first the attempt is discarded and the body runs again,
/// up to [`TransactionConfig::max_attempts`] times.
///
/// Reads inside a transaction see committed data only; buffered writes
/// become visible when the transaction commits.
///
/// Failure injection hooks make contention and transport errors
/// reproducible in tests.
///
/// # Example
///
/// ```rust
/// use docket_core::{CoreResult, Database, Document, DocumentPath, InMemoryDatabase};
///
/// let db = InMemoryDatabase::new();
/// let path = DocumentPath::new("users/u1").unwrap();
/// let result: CoreResult<()> = db.run_transaction(|tx| tx.create(&path, Document::new()));
/// result.unwrap();
/// assert!(db.document(&path).is_some());
/// ```
#[derive(Debug, Default)]
pub struct InMemoryDatabase {
    store: RwLock<Store>,
    config: TransactionConfig,
    contention: AtomicU32,
    failing: RwLock<HashSet<DocumentPath>>,
    attempts: AtomicU64,
}

impl InMemoryDatabase {
    /// Creates an empty database with the default retry configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty database with the given retry configuration.
    #[must_use]
    pub fn with_config(config: TransactionConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Returns the retry configuration.
    pub fn config(&self) -> &TransactionConfig {
        &self.config
    }

    /// Stores a document directly, replacing any existing one.
    pub fn insert(&self, path: DocumentPath, data: Document) {
        let mut store = self.store.write();
        store.commits += 1;
        let version = store.commits;
        store.versions.insert(path.clone(), version);
        store.docs.insert(path, data);
    }

    /// Returns a copy of a stored document.
    #[must_use]
    pub fn document(&self, path: &DocumentPath) -> Option<Document> {
        self.store.read().docs.get(path).cloned()
    }

    /// Returns the number of stored documents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.store.read().docs.len()
    }

    /// Returns true if no documents are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.store.read().docs.is_empty()
    }

    /// Returns how many transaction attempts have started.
    #[must_use]
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Forces the next `n` transaction commits to fail validation, so
    /// their bodies run again.
    pub fn inject_contention(&self, n: u32) {
        self.contention.store(n, Ordering::SeqCst);
    }

    /// Makes every write to `path` fail with a fatal transport error.
    pub fn fail_writes_to(&self, path: DocumentPath) {
        self.failing.write().insert(path);
    }

    /// Removes every injected write failure.
    pub fn clear_write_failures(&self) {
        self.failing.write().clear();
    }

    fn check_writable(&self, path: &DocumentPath) -> CoreResult<()> {
        if self.failing.read().contains(path) {
            return Err(CoreError::transport_fatal(format!(
                "write to {path} rejected"
            )));
        }
        Ok(())
    }

    fn take_contention(&self) -> bool {
        self.contention
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl Database for InMemoryDatabase {
    fn run_transaction<T, E, F>(&self, mut body: F) -> Result<T, E>
    where
        F: FnMut(&mut dyn DocumentTransaction) -> Result<T, E>,
        E: From<CoreError>,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let mut last_error = None;

        for attempt in 0..max_attempts {
            let delay = self.config.delay_for_attempt(attempt);
            if !delay.is_zero() {
                std::thread::sleep(delay);
            }
            self.attempts.fetch_add(1, Ordering::SeqCst);

            let mut tx = MemoryTransaction::new(self);
            let value = body(&mut tx)?;
            match tx.commit() {
                Ok(()) => return Ok(value),
                Err(err @ CoreError::Contention { .. }) => {
                    debug!(attempt, error = %err, "transaction contended, retrying");
                    last_error = Some(err);
                }
                Err(err) => return Err(err.into()),
            }
        }

        let reason = last_error.map_or_else(|| "no attempt made".to_string(), |e| e.to_string());
        warn!(attempts = max_attempts, %reason, "transaction aborted");
        Err(CoreError::TransactionAborted {
            attempts: max_attempts,
            reason,
        }
        .into())
    }

    fn get(&self, path: &DocumentPath) -> CoreResult<Snapshot> {
        Ok(self.store.read().snapshot(path))
    }

    fn query(&self, query: &Query) -> CoreResult<Vec<Snapshot>> {
        Ok(self.store.read().query(query))
    }

    fn apply(&self, writes: Vec<Write>) -> CoreResult<()> {
        for write in &writes {
            self.check_writable(write.path())?;
        }
        self.store.write().commit(writes)
    }
}

struct MemoryTransaction<'a> {
    db: &'a InMemoryDatabase,
    reads: HashMap<DocumentPath, u64>,
    writes: Vec<Write>,
}

impl<'a> MemoryTransaction<'a> {
    fn new(db: &'a InMemoryDatabase) -> Self {
        Self {
            db,
            reads: HashMap::new(),
            writes: Vec::new(),
        }
    }

    fn record(&mut self, path: &DocumentPath, version: u64) {
        self.reads.entry(path.clone()).or_insert(version);
    }

    fn commit(self) -> CoreResult<()> {
        if self.db.take_contention() {
            let path = self
                .writes
                .first()
                .map_or_else(|| "<transaction>".to_string(), |w| w.path().to_string());
            return Err(CoreError::contention(path));
        }

        let mut store = self.db.store.write();
        for (path, version) in &self.reads {
            if store.version(path) != *version {
                return Err(CoreError::contention(path.as_str()));
            }
        }
        store.commit(self.writes)
    }
}

impl DocumentTransaction for MemoryTransaction<'_> {
    fn get(&mut self, path: &DocumentPath) -> CoreResult<Snapshot> {
        let store = self.db.store.read();
        let version = store.version(path);
        let snapshot = store.snapshot(path);
        drop(store);
        self.record(path, version);
        Ok(snapshot)
    }

    fn query(&mut self, query: &Query) -> CoreResult<Vec<Snapshot>> {
        let store = self.db.store.read();
        let rows = store.query(query);
        let versions: Vec<_> = rows.iter().map(|r| (r.path.clone(), store.version(&r.path))).collect();
        drop(store);
        for (path, version) in versions {
            self.record(&path, version);
        }
        Ok(rows)
    }

    fn create(&mut self, path: &DocumentPath, data: Document) -> CoreResult<()> {
        self.db.check_writable(path)?;
        let store = self.db.store.read();
        if store.docs.contains_key(path) {
            return Err(CoreError::conflict(path.as_str()));
        }
        let version = store.version(path);
        drop(store);
        self.record(path, version);
        self.writes.push(Write::Create {
            path: path.clone(),
            data,
        });
        Ok(())
    }

    fn delete(&mut self, path: &DocumentPath) -> CoreResult<()> {
        self.db.check_writable(path)?;
        self.writes.push(Write::Delete { path: path.clone() });
        Ok(())
    }

    fn merge(&mut self, path: &DocumentPath, patch: Patch) -> CoreResult<()> {
        self.db.check_writable(path)?;
        self.writes.push(Write::Merge {
            path: path.clone(),
            patch,
        });
        Ok(())
    }
}
