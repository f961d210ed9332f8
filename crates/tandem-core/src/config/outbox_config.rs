use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::defaults;

/// Batching and commit settings for the outbox scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutboxConfig {
    /// Pending operation count that triggers an immediate flush. Default: 10.
    pub max_batch_size: usize,
    /// Longest time the oldest pending operation waits before a flush. Default: 2000.
    pub max_wait_ms: u64,
    /// Timeout applied to each remote commit and fetch. Default: 10000.
    pub commit_timeout_ms: u64,
}

impl OutboxConfig {
    pub fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms)
    }

    pub fn commit_timeout(&self) -> Duration {
        Duration::from_millis(self.commit_timeout_ms)
    }
}

impl Default for OutboxConfig {
    fn default() -> Self {
        Self {
            max_batch_size: defaults::DEFAULT_MAX_BATCH_SIZE,
            max_wait_ms: defaults::DEFAULT_MAX_WAIT_MS,
            commit_timeout_ms: defaults::DEFAULT_COMMIT_TIMEOUT_MS,
        }
    }
}
