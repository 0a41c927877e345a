//! Error types for the codec crate.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur while converting document values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The value does not have the expected shape.
    #[error("invalid structure: {message}")]
    InvalidStructure {
        /// Description of the structural error.
        message: String,
    },

    /// JSON could not be produced or parsed.
    #[error("json error: {message}")]
    Json {
        /// Description of the JSON error.
        message: String,
    },

    /// Non-finite floats have no JSON representation.
    #[error("non-finite float cannot be encoded")]
    NonFiniteFloat,

    /// A timestamp lies outside the representable calendar range.
    #[error("timestamp out of range: {seconds}s {nanos}ns")]
    TimestampOutOfRange {
        /// Seconds since the Unix epoch.
        seconds: i64,
        /// Sub-second nanoseconds.
        nanos: u32,
    },
}

impl CodecError {
    /// Create an invalid structure error.
    pub fn invalid_structure(message: impl Into<String>) -> Self {
        Self::InvalidStructure {
            message: message.into(),
        }
    }

    /// Create a JSON error.
    pub fn json(message: impl Into<String>) -> Self {
        Self::Json {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for CodecError {
    fn from(err: serde_json::Error) -> Self {
        Self::json(err.to_string())
    }
}
