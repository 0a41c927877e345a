//! Error types for Docket core.

use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in Docket core operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// No matching document exists.
    #[error("not found: {what}")]
    NotFound {
        /// What was looked up.
        what: String,
    },

    /// A create targeted a document that already exists.
    #[error("document already exists: {path}")]
    Conflict {
        /// Path of the existing document.
        path: String,
    },

    /// Unrecognized lifecycle or operation combination.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why the operation is invalid.
        message: String,
    },

    /// Database I/O failed.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// A path did not have the expected shape.
    #[error("invalid path {path:?}: {reason}")]
    InvalidPath {
        /// The rejected path.
        path: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The transaction could not commit because of concurrent writers.
    #[error("transaction contention on {path}")]
    Contention {
        /// Path whose version changed since it was read.
        path: String,
    },

    /// The database gave up re-running a contended transaction.
    #[error("transaction aborted after {attempts} attempts: {reason}")]
    TransactionAborted {
        /// Number of attempts made.
        attempts: u32,
        /// Reason for abort.
        reason: String,
    },

    /// Value conversion error.
    #[error("codec error: {0}")]
    Codec(#[from] docket_codec::CodecError),
}

impl CoreError {
    /// Creates a not found error.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Creates a conflict error.
    pub fn conflict(path: impl Into<String>) -> Self {
        Self::Conflict { path: path.into() }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Creates a contention error.
    pub fn contention(path: impl Into<String>) -> Self {
        Self::Contention { path: path.into() }
    }

    /// Creates an invalid path error.
    pub fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Returns true for [`CoreError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, CoreError::NotFound { .. })
    }

    /// Returns true if re-running the whole transaction may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            CoreError::Transport { retryable, .. } => *retryable,
            CoreError::Contention { .. } => true,
            _ => false,
        }
    }
}
