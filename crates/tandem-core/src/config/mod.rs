//! Engine configuration, loaded from TOML. Every section and field has a default,
//! so an empty document is a valid configuration.

pub mod defaults;
mod observability_config;
mod outbox_config;
mod retry_config;
mod storage_config;

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::{TandemError, TandemResult};

pub use observability_config::ObservabilityConfig;
pub use outbox_config::OutboxConfig;
pub use retry_config::RetryConfig;
pub use storage_config::StorageConfig;

/// Top-level configuration for one engine instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TandemConfig {
    /// Logical collection synced by this engine. All devices address the same id.
    pub collection_id: String,
    /// Identity of this device. Empty means "generate once and persist".
    pub device_id: String,
    pub outbox: OutboxConfig,
    pub retry: RetryConfig,
    pub storage: StorageConfig,
    pub observability: ObservabilityConfig,
}

impl Default for TandemConfig {
    fn default() -> Self {
        Self {
            collection_id: defaults::DEFAULT_COLLECTION_ID.to_string(),
            device_id: String::new(),
            outbox: OutboxConfig::default(),
            retry: RetryConfig::default(),
            storage: StorageConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl TandemConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml(source: &str) -> TandemResult<Self> {
        let config: Self =
            toml::from_str(source).map_err(|e| TandemError::ConfigError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse, and validate a TOML file.
    pub fn from_file(path: &Path) -> TandemResult<Self> {
        let source = std::fs::read_to_string(path).map_err(|e| {
            TandemError::ConfigError(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml(&source)
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> TandemResult<()> {
        if self.collection_id.trim().is_empty() {
            return Err(TandemError::ConfigError(
                "collection_id must not be empty".into(),
            ));
        }
        if self.outbox.max_batch_size == 0 {
            return Err(TandemError::ConfigError(
                "outbox.max_batch_size must be at least 1".into(),
            ));
        }
        if self.outbox.commit_timeout_ms == 0 {
            return Err(TandemError::ConfigError(
                "outbox.commit_timeout_ms must be positive".into(),
            ));
        }
        if self.retry.replay_interval_ms == 0 {
            return Err(TandemError::ConfigError(
                "retry.replay_interval_ms must be positive".into(),
            ));
        }
        if self.retry.initial_backoff_ms > self.retry.max_backoff_ms {
            return Err(TandemError::ConfigError(format!(
                "retry.initial_backoff_ms ({}) exceeds retry.max_backoff_ms ({})",
                self.retry.initial_backoff_ms, self.retry.max_backoff_ms
            )));
        }
        Ok(())
    }
}
