//! Retry and replay policy for operations whose commit failed.
//!
//! # Examples
//!
//! ```
//! use std::time::Duration;
//! use tandem_core::config::RetryConfig;
//!
//! let config = RetryConfig::default();
//! assert_eq!(config.attempt_cap(), None);
//! assert_eq!(config.backoff_for(1), Duration::from_millis(500));
//! assert_eq!(config.backoff_for(2), Duration::from_millis(1000));
//! assert_eq!(config.backoff_for(30), Duration::from_secs(60));
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::defaults;

/// Retry policy. Operations are never discarded when the cap is reached;
/// they stall until connectivity returns or a sync is forced.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Attempts before an operation stalls. 0 means unlimited. Default: 0.
    pub max_attempts: u32,
    /// Delay before the first retry. Doubles per attempt. Default: 500.
    pub initial_backoff_ms: u64,
    /// Upper bound on the retry delay. Default: 60000.
    pub max_backoff_ms: u64,
    /// Interval of the periodic replay trigger. Default: 30000.
    pub replay_interval_ms: u64,
}

impl RetryConfig {
    /// The attempt cap, or `None` when retries are unlimited.
    pub fn attempt_cap(&self) -> Option<u32> {
        (self.max_attempts > 0).then_some(self.max_attempts)
    }

    /// Whether an operation that has failed `attempt` times should stall.
    pub fn is_exhausted(&self, attempt: u32) -> bool {
        self.attempt_cap().is_some_and(|cap| attempt >= cap)
    }

    /// Delay before retrying an operation that has failed `attempt` times.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32);
        let millis = self
            .initial_backoff_ms
            .saturating_mul(1u64 << exponent)
            .min(self.max_backoff_ms);
        Duration::from_millis(millis)
    }

    pub fn replay_interval(&self) -> Duration {
        Duration::from_millis(self.replay_interval_ms)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: defaults::DEFAULT_MAX_ATTEMPTS,
            initial_backoff_ms: defaults::DEFAULT_INITIAL_BACKOFF_MS,
            max_backoff_ms: defaults::DEFAULT_MAX_BACKOFF_MS,
            replay_interval_ms: defaults::DEFAULT_REPLAY_INTERVAL_MS,
        }
    }
}
