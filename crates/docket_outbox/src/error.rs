//! Error types for the outbox and inbox.

use docket_codec::CodecError;
use docket_core::CoreError;
use thiserror::Error;

/// Result type for outbox operations.
pub type OutboxResult<T> = Result<T, OutboxError>;

/// Failure to publish a message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusError {
    /// The bus could not be reached.
    #[error("message bus unavailable: {message}")]
    Unavailable {
        /// Error message.
        message: String,
    },

    /// The bus refused the message.
    #[error("publish to {topic} rejected: {message}")]
    Rejected {
        /// Topic the message was sent to.
        topic: String,
        /// Error message.
        message: String,
    },
}

impl BusError {
    /// Creates an unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Creates a rejected error.
    pub fn rejected(topic: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Rejected {
            topic: topic.into(),
            message: message.into(),
        }
    }

    /// Returns true if publishing again may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, BusError::Unavailable { .. })
    }
}

/// Errors that can occur in outbox and inbox operations.
#[derive(Debug, Error)]
pub enum OutboxError {
    /// Database or lifecycle error.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Publishing failed.
    #[error(transparent)]
    Bus(#[from] BusError),

    /// A stored value had the wrong shape.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Message encoding failed.
    #[error("message encoding error: {0}")]
    Json(#[from] serde_json::Error),
}

impl OutboxError {
    /// Returns true for a not-found database error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, OutboxError::Core(err) if err.is_not_found())
    }
}
