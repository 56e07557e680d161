//! Application-level errors (wraps domain and store errors)

use thiserror::Error;

use crate::domain::{DanglingParent, DomainError, GroupKey};
use crate::infrastructure::StoreError;

/// Application errors wrap domain errors and add application-level context.
#[derive(Error, Debug)]
pub enum ApplicationError {
    #[error("{0}")]
    Domain(#[from] DomainError),

    #[error("{0}")]
    Store(#[from] StoreError),

    #[error("no links in group: {0}")]
    SourceGroupEmpty(GroupKey),

    #[error("{} link(s) reference parents outside the group", .0.len())]
    DanglingReferences(Vec<DanglingParent>),

    #[error("config error: {message}")]
    Config { message: String },
}

/// Result type for application layer operations.
pub type ApplicationResult<T> = Result<T, ApplicationError>;
