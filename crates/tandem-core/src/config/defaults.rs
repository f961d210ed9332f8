// Single source of truth for all default values.

// --- Collection ---
pub const DEFAULT_COLLECTION_ID: &str = "default";

// --- Outbox ---
pub const DEFAULT_MAX_BATCH_SIZE: usize = 10;
pub const DEFAULT_MAX_WAIT_MS: u64 = 2_000;
pub const DEFAULT_COMMIT_TIMEOUT_MS: u64 = 10_000;

// --- Retry ---
pub const DEFAULT_MAX_ATTEMPTS: u32 = 0; // 0 = unlimited
pub const DEFAULT_INITIAL_BACKOFF_MS: u64 = 500;
pub const DEFAULT_MAX_BACKOFF_MS: u64 = 60_000;
pub const DEFAULT_REPLAY_INTERVAL_MS: u64 = 30_000;

// --- Storage ---
pub const DEFAULT_DB_FILENAME: &str = "tandem.db";
pub const DEFAULT_WAL_MODE: bool = true;
pub const DEFAULT_BUSY_TIMEOUT_MS: u32 = 5_000;

// --- Observability ---
pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const DEFAULT_JSON_LOGS: bool = false;
