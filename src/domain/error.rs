//! Domain-level errors (no external dependencies)

use thiserror::Error;

use crate::domain::entities::GlobalKey;

/// Domain errors represent violations of the link tree model.
/// These are independent of storage concerns.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid group key '{value}': {reason}")]
    InvalidGroupKey { value: String, reason: String },

    #[error("invalid global key '{0}'")]
    InvalidGlobalKey(String),

    #[error("global key appears more than once in source set: {0}")]
    DuplicateGlobalKey(GlobalKey),

    #[error("key generator kept returning keys already in use (last: {0})")]
    KeyCollision(GlobalKey),

    #[error("record {0} has no entry in the remap table")]
    UnmappedRecord(GlobalKey),

    #[error("record {record} references parent {parent} outside its group")]
    DanglingParentReference { record: GlobalKey, parent: GlobalKey },

    #[error("cycle detected in parent chain at: {0}")]
    CycleDetected(GlobalKey),
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
