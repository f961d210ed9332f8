//! StorageEngine: owns the SQLite connection, runs migrations at open, and
//! implements `IDurableStore`.

use std::path::{Path, PathBuf};

use tandem_core::config::StorageConfig;
use tandem_core::errors::{StorageError, TandemResult};
use tandem_core::traits::IDurableStore;

use crate::migrations;
use crate::pool::pragmas;
use crate::pool::WriteConnection;
use crate::queries::{maintenance, record_ops};

/// SQLite-backed durable store.
pub struct StorageEngine {
    writer: WriteConnection,
    db_path: Option<PathBuf>,
}

impl StorageEngine {
    /// Open a store backed by a file on disk with default settings.
    pub fn open(path: &Path) -> TandemResult<Self> {
        Self::open_with_config(path, &StorageConfig::default())
    }

    /// Open a store backed by a file on disk.
    pub fn open_with_config(path: &Path, config: &StorageConfig) -> TandemResult<Self> {
        let writer = WriteConnection::open(path, config)?;
        let engine = Self {
            writer,
            db_path: Some(path.to_path_buf()),
        };
        engine.initialize()?;
        tracing::debug!(path = %path.display(), "opened durable store");
        Ok(engine)
    }

    /// Open an in-memory store (for testing). Nothing survives a drop.
    pub fn open_in_memory() -> TandemResult<Self> {
        let engine = Self {
            writer: WriteConnection::open_in_memory()?,
            db_path: None,
        };
        engine.initialize()?;
        Ok(engine)
    }

    /// Run migrations, then refuse to continue on a damaged file.
    fn initialize(&self) -> TandemResult<()> {
        self.writer.with_conn(|conn| {
            migrations::run_migrations(conn)?;
            if !maintenance::integrity_check(conn)? {
                return Err(StorageError::CorruptionDetected {
                    details: "PRAGMA integrity_check did not return ok".into(),
                }
                .into());
            }
            Ok(())
        })
    }

    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    pub fn schema_version(&self) -> TandemResult<u32> {
        self.writer.with_conn(migrations::current_version)
    }

    pub fn integrity_check(&self) -> TandemResult<bool> {
        self.writer.with_conn(maintenance::integrity_check)
    }

    pub fn is_wal(&self) -> TandemResult<bool> {
        self.writer.with_conn(pragmas::verify_wal_mode)
    }

    /// Fold the WAL back into the main file. Call before shutdown.
    pub fn checkpoint(&self) -> TandemResult<()> {
        self.writer.with_conn(maintenance::wal_checkpoint)
    }
}

impl IDurableStore for StorageEngine {
    fn read(&self, namespace: &str, key: &str) -> TandemResult<Option<Vec<u8>>> {
        self.writer
            .with_conn(|conn| record_ops::get_record(conn, namespace, key))
    }

    fn write(&self, namespace: &str, key: &str, bytes: &[u8]) -> TandemResult<()> {
        self.writer
            .with_conn(|conn| record_ops::upsert_record(conn, namespace, key, bytes))
    }

    fn remove(&self, namespace: &str, key: &str) -> TandemResult<()> {
        self.writer
            .with_conn(|conn| record_ops::delete_record(conn, namespace, key))
    }

    fn scan(&self, namespace: &str) -> TandemResult<Vec<(String, Vec<u8>)>> {
        self.writer
            .with_conn(|conn| record_ops::scan_namespace(conn, namespace))
    }

    fn remove_many(&self, namespace: &str, keys: &[String]) -> TandemResult<()> {
        self.writer
            .with_conn(|conn| record_ops::delete_records(conn, namespace, keys))
    }

    fn count(&self, namespace: &str) -> TandemResult<usize> {
        self.writer
            .with_conn(|conn| record_ops::count_namespace(conn, namespace))
    }
}
