use thiserror::Error;

use crate::Error;

/// Errors surfaced through the `UniFFI` bindings.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Configuration could not be loaded or was rejected.
    #[error("invalid configuration")]
    Config,
    /// Filesystem interaction failed.
    #[error("filesystem error")]
    Io,
    /// JSON (de)serialization failed.
    #[error("json error")]
    Json,
    /// Internal invariant failed.
    #[error("internal error")]
    Internal,
    /// No snapshot is recorded for the requested owner and method.
    #[error("snapshot not found")]
    SnapshotNotFound,
}

impl From<Error> for CoreError {
    fn from(error: Error) -> Self {
        match error {
            Error::Config(_) => Self::Config,
            Error::Io { .. } => Self::Io,
            Error::Json { .. } => Self::Json,
            Error::Pattern { .. } => Self::Internal,
        }
    }
}
