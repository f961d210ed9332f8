//! Error types for every Tandem subsystem.
//!
//! Subsystem errors convert into [`TandemError`] via `From`, so `?` works
//! across crate boundaries.

mod storage_error;
mod sync_error;

pub use storage_error::StorageError;
pub use sync_error::SyncError;

/// Top-level error for the Tandem workspace.
#[derive(Debug, thiserror::Error)]
pub enum TandemError {
    #[error("storage error: {0}")]
    StorageError(#[from] StorageError),

    #[error("sync error: {0}")]
    SyncError(#[from] SyncError),

    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("invalid mutation for key {key:?}: {reason}")]
    InvalidMutation { key: String, reason: String },

    #[error("config error: {0}")]
    ConfigError(String),
}

/// Result alias used throughout the workspace.
pub type TandemResult<T> = Result<T, TandemError>;

impl TandemError {
    /// The sync error carried by this error, if any.
    pub fn as_sync_error(&self) -> Option<&SyncError> {
        match self {
            TandemError::SyncError(e) => Some(e),
            _ => None,
        }
    }

    /// Whether retrying the failed operation later may succeed.
    pub fn is_retryable(&self) -> bool {
        self.as_sync_error().is_some_and(SyncError::is_retryable)
    }
}
