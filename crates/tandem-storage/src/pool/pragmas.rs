//! PRAGMA configuration applied to every SQLite connection.
//!
//! WAL mode (configurable), FULL sync so an acknowledged write survives
//! power loss, 16MB cache, configurable busy_timeout.

use rusqlite::Connection;

use tandem_core::config::StorageConfig;
use tandem_core::errors::TandemResult;

use crate::to_storage_err;

/// Apply durability and performance pragmas to a connection.
pub fn apply_pragmas(conn: &Connection, config: &StorageConfig) -> TandemResult<()> {
    if config.wal_mode {
        conn.execute_batch("PRAGMA journal_mode = WAL;")
            .map_err(|e| to_storage_err(e.to_string()))?;
    }
    conn.execute_batch(&format!(
        "
        PRAGMA synchronous = FULL;
        PRAGMA cache_size = -16000;
        PRAGMA busy_timeout = {};
        PRAGMA foreign_keys = ON;
        ",
        config.busy_timeout_ms
    ))
    .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(())
}

/// Verify that WAL mode is active on a connection.
pub fn verify_wal_mode(conn: &Connection) -> TandemResult<bool> {
    let mode: String = conn
        .pragma_query_value(None, "journal_mode", |row| row.get(0))
        .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(mode.eq_ignore_ascii_case("wal"))
}
