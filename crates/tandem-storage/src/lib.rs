//! # tandem-storage
//!
//! Durable namespaced record store behind [`tandem_core::IDurableStore`].
//! [`StorageEngine`] persists to SQLite through a single serialized write
//! connection; [`MemoryStore`] keeps records in process for tests and
//! ephemeral replicas.

pub mod engine;
pub mod memory;
pub mod migrations;
pub mod pool;
pub mod queries;

pub use engine::StorageEngine;
pub use memory::MemoryStore;

use tandem_core::errors::{StorageError, TandemError};

/// Helper to convert a rusqlite error message into a `TandemError`.
pub(crate) fn to_storage_err(msg: String) -> TandemError {
    TandemError::StorageError(StorageError::SqliteError { message: msg })
}
