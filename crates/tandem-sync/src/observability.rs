//! Tracing setup and span definitions for flush, merge, and commit work.

use tracing_subscriber::EnvFilter;

use tandem_core::config::ObservabilityConfig;
use tandem_core::errors::{TandemError, TandemResult};

/// Install a global `tracing` subscriber.
///
/// `RUST_LOG` takes precedence over `config.log_level`. Fails if a global
/// subscriber is already set.
pub fn init_tracing(config: &ObservabilityConfig) -> TandemResult<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .map_err(|e| TandemError::ConfigError(format!("invalid log level: {e}")))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let result = if config.json_logs {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    result.map_err(|e| TandemError::ConfigError(format!("tracing init failed: {e}")))
}

/// Create a flush span.
#[macro_export]
macro_rules! flush_span {
    ($collection:expr) => {
        tracing::info_span!("tandem.flush", collection = %$collection)
    };
}

/// Create a commit span.
#[macro_export]
macro_rules! commit_span {
    ($batch_id:expr, $size:expr) => {
        tracing::debug_span!("tandem.commit", batch_id = %$batch_id, size = $size)
    };
}

/// Create a merge span.
#[macro_export]
macro_rules! merge_span {
    ($trigger:expr, $revision:expr) => {
        tracing::info_span!("tandem.merge", trigger = ?$trigger, revision = $revision)
    };
}
