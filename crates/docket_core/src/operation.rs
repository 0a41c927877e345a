//! Database operations derived from tracked entities.

use crate::document::WriteData;
use crate::entity::TrackingMode;
use crate::error::{CoreError, CoreResult};
use crate::path::DocumentPath;
use std::fmt;

/// Kind of write an operation performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpType {
    /// Unconditional create; fails if the target exists.
    Create,
    /// Diffed partial merge-write.
    Update,
    /// Unconditional delete.
    Delete,
}

impl OpType {
    /// Maps a lifecycle mode to the operation it produces.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidOperation`] for [`TrackingMode::Untracked`],
    /// which never produces an operation.
    pub fn for_mode(mode: TrackingMode) -> CoreResult<Self> {
        match mode {
            TrackingMode::Create => Ok(OpType::Create),
            TrackingMode::Tracked => Ok(OpType::Update),
            TrackingMode::Delete => Ok(OpType::Delete),
            TrackingMode::Untracked => Err(CoreError::invalid_operation(
                "untracked entities produce no operation",
            )),
        }
    }
}

impl fmt::Display for OpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpType::Create => f.write_str("create"),
            OpType::Update => f.write_str("update"),
            OpType::Delete => f.write_str("delete"),
        }
    }
}

/// A single pending write.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    /// What kind of write.
    pub op_type: OpType,
    /// Target document.
    pub target: DocumentPath,
    /// Intended field data. Ignored for deletes.
    pub data: WriteData,
}

impl Operation {
    /// Creates an operation.
    pub fn new(op_type: OpType, target: DocumentPath, data: WriteData) -> Self {
        Self {
            op_type,
            target,
            data,
        }
    }
}
