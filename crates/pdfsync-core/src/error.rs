use thiserror::Error;

/// Errors that can occur in the sync and update layers.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Sync already in progress")]
    SyncInProgress,

    #[error("Internal error: {0}")]
    Internal(String),
}
