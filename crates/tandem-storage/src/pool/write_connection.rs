//! Single connection behind `std::sync::Mutex`.
//! Store calls are short and synchronous, and callers may already be inside
//! a tokio runtime, so the lock is a plain blocking mutex.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::Connection;

use tandem_core::config::StorageConfig;
use tandem_core::errors::{StorageError, TandemResult};

use super::pragmas::apply_pragmas;
use crate::to_storage_err;

/// The one connection every query goes through.
pub struct WriteConnection {
    conn: Mutex<Connection>,
}

impl WriteConnection {
    /// Open a connection to the given database path.
    pub fn open(path: &Path, config: &StorageConfig) -> TandemResult<Self> {
        let conn = Connection::open(path).map_err(|e| to_storage_err(e.to_string()))?;
        apply_pragmas(&conn, config)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> TandemResult<Self> {
        let conn = Connection::open_in_memory().map_err(|e| to_storage_err(e.to_string()))?;
        let config = StorageConfig {
            wal_mode: false,
            ..StorageConfig::default()
        };
        apply_pragmas(&conn, &config)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Acquire the lock and execute a closure with the connection.
    pub fn with_conn<F, T>(&self, f: F) -> TandemResult<T>
    where
        F: FnOnce(&Connection) -> TandemResult<T>,
    {
        let guard = self.conn.lock().map_err(|e| StorageError::LockPoisoned {
            details: e.to_string(),
        })?;
        f(&guard)
    }
}
