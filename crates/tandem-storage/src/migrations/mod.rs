//! Schema migrations using PRAGMA user_version.

pub mod v001_records;

use rusqlite::Connection;

use tandem_core::errors::{StorageError, TandemResult};

/// Latest schema version this build knows about.
pub const LATEST_VERSION: u32 = 1;

/// Run all pending migrations.
pub fn run_migrations(conn: &Connection) -> TandemResult<()> {
    let current = current_version(conn)?;

    let migrations: &[(fn(&Connection) -> TandemResult<()>, u32)] =
        &[(v001_records::migrate, 1)];

    for (migrate, version) in migrations {
        if current < *version {
            migrate(conn).map_err(|e| StorageError::MigrationFailed {
                version: *version,
                reason: e.to_string(),
            })?;
            conn.pragma_update(None, "user_version", version)
                .map_err(|e| StorageError::MigrationFailed {
                    version: *version,
                    reason: e.to_string(),
                })?;
            tracing::info!(version = version, "applied migration");
        }
    }

    Ok(())
}

/// Get the current schema version.
pub fn current_version(conn: &Connection) -> TandemResult<u32> {
    let version = conn
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .map_err(|e| StorageError::SqliteError {
            message: e.to_string(),
        })?;
    Ok(version)
}
