/// Sync failures, classified by how the engine reacts to them.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SyncError {
    /// No connectivity, remote unreachable, or the attempt timed out.
    /// Retried automatically.
    #[error("network error: {reason}")]
    TransientNetwork { reason: String },

    /// The remote rejected the write. Resolved by re-fetching and merging.
    #[error("commit conflict: {reason}")]
    CommitConflict { reason: String },

    /// A stored record failed shape validation and was dropped.
    #[error("corrupt local record {namespace}/{record_key}: {reason}")]
    CorruptLocalRecord {
        namespace: String,
        record_key: String,
        reason: String,
    },

    /// The configured retry cap was reached. The operation stays queued.
    #[error("retries exhausted for key {key:?} after {attempts} attempts")]
    ExhaustedRetry { key: String, attempts: u32 },
}

impl SyncError {
    /// Shorthand for a [`SyncError::TransientNetwork`].
    pub fn network(reason: impl Into<String>) -> Self {
        SyncError::TransientNetwork {
            reason: reason.into(),
        }
    }

    /// Shorthand for a [`SyncError::CommitConflict`].
    pub fn conflict(reason: impl Into<String>) -> Self {
        SyncError::CommitConflict {
            reason: reason.into(),
        }
    }

    /// Whether a later attempt may succeed without user involvement.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SyncError::TransientNetwork { .. } | SyncError::CommitConflict { .. }
        )
    }

    /// Stable short name, used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            SyncError::TransientNetwork { .. } => "transient_network",
            SyncError::CommitConflict { .. } => "commit_conflict",
            SyncError::CorruptLocalRecord { .. } => "corrupt_local_record",
            SyncError::ExhaustedRetry { .. } => "exhausted_retry",
        }
    }
}
