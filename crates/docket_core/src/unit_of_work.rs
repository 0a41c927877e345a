//! Retry-safe units of work.
//!
//! [`UnitOfWork::commit`] runs application code inside a database
//! transaction. The database may run the body several times; every attempt
//! starts from cleared repositories and an empty change tracker, so nothing
//! recorded by a discarded attempt can leak into the next one.

use crate::coordinator::{CommitSummary, TransactionCoordinator};
use crate::database::{Database, Query, Write};
use crate::document::{blind_patch, creatable, Snapshot};
use crate::error::{CoreError, CoreResult};
use crate::operation::OpType;
use crate::path::DocumentPath;
use crate::repository::RepositorySet;
use crate::tracker::ChangeTracker;
use tracing::{debug, info};

/// Result of a committed unit of work.
#[derive(Debug, Clone, PartialEq)]
pub struct Committed<T> {
    /// Value returned by the work closure.
    pub value: T,
    /// Writes issued by the final attempt.
    pub summary: CommitSummary,
    /// Number of times the work closure ran.
    pub attempts: u32,
}

/// Runs work against a [`Database`] and commits the registered repositories.
#[derive(Debug, Clone)]
pub struct UnitOfWork<D> {
    db: D,
}

impl<D: Database> UnitOfWork<D> {
    /// Creates a unit of work over `db`.
    pub fn new(db: D) -> Self {
        Self { db }
    }

    /// Returns the underlying database.
    pub fn database(&self) -> &D {
        &self.db
    }

    /// Runs `work` in a transaction, then commits the pending operations of
    /// `repos` in the same transaction.
    ///
    /// `work` may run more than once. Before each run every repository in
    /// `repos` is cleared and reads are forgotten.
    ///
    /// # Errors
    ///
    /// Returns the first error of `work`, of the commit, or of the database.
    pub fn commit<R, T, E, F>(&self, repos: &mut R, mut work: F) -> Result<Committed<T>, E>
    where
        R: RepositorySet + ?Sized,
        F: FnMut(&mut TransactionCoordinator<'_>, &mut R) -> Result<T, E>,
        E: From<CoreError>,
    {
        let mut tracker = ChangeTracker::new();
        let mut attempts = 0u32;

        let outcome: Result<(T, CommitSummary), E> = self.db.run_transaction(|tx| {
            attempts += 1;
            debug!(attempt = attempts, "starting unit of work attempt");
            repos.reset();
            tracker.reset();

            let mut coordinator = TransactionCoordinator::new(tx, &mut tracker);
            let value = work(&mut coordinator, repos)?;
            let summary = coordinator.commit(&*repos)?;
            Ok((value, summary))
        });
        let (value, summary) = outcome?;

        info!(
            attempts,
            created = summary.created,
            updated = summary.updated,
            deleted = summary.deleted,
            skipped = summary.skipped,
            "unit of work committed"
        );
        Ok(Committed {
            value,
            summary,
            attempts,
        })
    }

    /// Runs `work` without a transaction and writes every pending operation
    /// blindly.
    ///
    /// Reads through the [`DirectReader`] are not tracked. Updates are
    /// merge-written in full, with unset fields deleted.
    ///
    /// # Errors
    ///
    /// Returns the first error of `work` or of the database.
    pub fn commit_direct<R, T, E, F>(&self, repos: &mut R, work: F) -> Result<Committed<T>, E>
    where
        R: RepositorySet + ?Sized,
        F: FnOnce(&DirectReader<'_, D>, &mut R) -> Result<T, E>,
        E: From<CoreError>,
    {
        repos.reset();
        let value = work(&DirectReader { db: &self.db }, repos)?;

        let mut summary = CommitSummary::default();
        let mut writes = Vec::new();
        for op in repos.all_operations()? {
            writes.push(match op.op_type {
                OpType::Create => {
                    summary.created += 1;
                    Write::Create {
                        path: op.target,
                        data: creatable(op.data),
                    }
                }
                OpType::Delete => {
                    summary.deleted += 1;
                    Write::Delete { path: op.target }
                }
                OpType::Update => {
                    summary.updated += 1;
                    Write::Merge {
                        path: op.target,
                        patch: blind_patch(op.data),
                    }
                }
            });
        }
        self.db.apply(writes)?;

        info!(
            created = summary.created,
            updated = summary.updated,
            deleted = summary.deleted,
            "direct commit applied"
        );
        Ok(Committed {
            value,
            summary,
            attempts: 1,
        })
    }
}

/// Untracked reads for [`UnitOfWork::commit_direct`].
pub struct DirectReader<'a, D> {
    db: &'a D,
}

impl<D: Database> DirectReader<'_, D> {
    /// Reads one document.
    ///
    /// # Errors
    ///
    /// Propagates database failures.
    pub fn get(&self, path: &DocumentPath) -> CoreResult<Snapshot> {
        self.db.get(path)
    }

    /// Runs a query.
    ///
    /// # Errors
    ///
    /// Propagates database failures.
    pub fn query(&self, query: &Query) -> CoreResult<Vec<Snapshot>> {
        self.db.query(query)
    }
}
