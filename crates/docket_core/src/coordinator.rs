//! One transaction attempt: tracked reads and the final commit.

use crate::database::{DocumentTransaction, Query};
use crate::document::{creatable, Snapshot};
use crate::error::CoreResult;
use crate::operation::OpType;
use crate::path::DocumentPath;
use crate::repository::RepositorySet;
use crate::tracker::ChangeTracker;
use tracing::{debug, trace};

/// Counts of the writes a commit issued.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitSummary {
    /// Documents created.
    pub created: usize,
    /// Documents merge-written.
    pub updated: usize,
    /// Documents deleted.
    pub deleted: usize,
    /// Updates dropped because nothing changed.
    pub skipped: usize,
}

impl CommitSummary {
    /// Total number of writes issued.
    pub fn writes(&self) -> usize {
        self.created + self.updated + self.deleted
    }
}

/// Routes reads of one attempt through a [`ChangeTracker`] and turns the
/// registered repositories' entities into minimal writes.
pub struct TransactionCoordinator<'a> {
    tx: &'a mut dyn DocumentTransaction,
    tracker: &'a mut ChangeTracker,
}

impl<'a> TransactionCoordinator<'a> {
    /// Wraps a transaction attempt. The tracker should be empty.
    pub fn new(tx: &'a mut dyn DocumentTransaction, tracker: &'a mut ChangeTracker) -> Self {
        Self { tx, tracker }
    }

    /// Reads one document and tracks what was seen.
    ///
    /// # Errors
    ///
    /// Propagates database failures. A missing document is not an error.
    pub fn get(&mut self, path: &DocumentPath) -> CoreResult<Snapshot> {
        let snapshot = self.tx.get(path)?;
        self.tracker.track(&snapshot.path, snapshot.data());
        Ok(snapshot)
    }

    /// Runs a query and tracks every returned document.
    ///
    /// # Errors
    ///
    /// Propagates database failures.
    pub fn query(&mut self, query: &Query) -> CoreResult<Vec<Snapshot>> {
        let snapshots = self.tx.query(query)?;
        for snapshot in &snapshots {
            self.tracker.track(&snapshot.path, snapshot.data());
        }
        Ok(snapshots)
    }

    /// Returns the tracker of this attempt.
    pub fn tracker(&self) -> &ChangeTracker {
        self.tracker
    }

    /// Issues every pending operation of `repos`.
    ///
    /// Creates and deletes are unconditional. Updates are diffed against the
    /// tracked reads and skipped when nothing changed.
    ///
    /// # Errors
    ///
    /// The first failing write aborts the commit; the caller must discard
    /// the attempt.
    pub fn commit<R: RepositorySet + ?Sized>(&mut self, repos: &R) -> CoreResult<CommitSummary> {
        let mut summary = CommitSummary::default();

        for op in repos.all_operations()? {
            trace!(op = ?op.op_type, path = %op.target, "issuing operation");
            match op.op_type {
                OpType::Create => {
                    self.tx.create(&op.target, creatable(op.data))?;
                    summary.created += 1;
                }
                OpType::Delete => {
                    self.tx.delete(&op.target)?;
                    summary.deleted += 1;
                }
                OpType::Update => match self.tracker.diff(&op.target, &op.data) {
                    Some(patch) => {
                        self.tx.merge(&op.target, patch)?;
                        summary.updated += 1;
                    }
                    None => summary.skipped += 1,
                },
            }
        }

        debug!(
            created = summary.created,
            updated = summary.updated,
            deleted = summary.deleted,
            skipped = summary.skipped,
            "operations issued"
        );
        Ok(summary)
    }
}
