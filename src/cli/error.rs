//! CLI-level errors (wraps infrastructure errors)

use thiserror::Error;

use crate::application::services::CloneErrorKind;
use crate::application::ApplicationError;
use crate::infrastructure::InfraError;

/// CLI errors are the top-level error type.
/// These are what get displayed to the user.
#[derive(Error, Debug)]
pub enum CliError {
    #[error("{0}")]
    Infra(#[from] InfraError),

    #[error("invalid arguments: {0}")]
    InvalidArgs(String),

    #[error("{0}")]
    Usage(String),

    #[error("clone failed ({kind}): {message}")]
    CloneFailed {
        kind: CloneErrorKind,
        message: String,
    },

    #[error("group has no links: {0}")]
    Unavailable(String),
}

impl From<ApplicationError> for CliError {
    fn from(e: ApplicationError) -> Self {
        CliError::Infra(InfraError::Application(e))
    }
}

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

impl CliError {
    /// Get the appropriate exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::InvalidArgs(_) | CliError::Usage(_) => crate::exitcode::USAGE,
            CliError::Unavailable(_) => crate::exitcode::NOINPUT,
            CliError::CloneFailed { kind, .. } => match kind {
                CloneErrorKind::SourceGroupEmpty => crate::exitcode::NOINPUT,
                CloneErrorKind::DanglingParentReference | CloneErrorKind::InvalidSource => {
                    crate::exitcode::DATAERR
                }
                CloneErrorKind::FetchFailure => crate::exitcode::IOERR,
                CloneErrorKind::PersistenceFailure => crate::exitcode::CANTCREAT,
            },
            CliError::Infra(e) => match e {
                InfraError::Application(ApplicationError::Config { .. }) => {
                    crate::exitcode::CONFIG
                }
                InfraError::Application(ApplicationError::Store(_)) => crate::exitcode::IOERR,
                InfraError::Application(ApplicationError::SourceGroupEmpty(_)) => {
                    crate::exitcode::NOINPUT
                }
                InfraError::Application(_) => crate::exitcode::DATAERR,
            },
        }
    }
}
