//! Record CRUD: upsert, get, delete, scan by namespace.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use tandem_core::errors::TandemResult;

use crate::to_storage_err;

/// Insert or replace a record. Replacing keeps the row id, so scan order
/// stays first-write order.
pub fn upsert_record(conn: &Connection, namespace: &str, key: &str, body: &[u8]) -> TandemResult<()> {
    conn.execute(
        "INSERT INTO records (namespace, record_key, body, updated_at)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(namespace, record_key)
         DO UPDATE SET body = excluded.body, updated_at = excluded.updated_at",
        params![namespace, key, body, Utc::now().to_rfc3339()],
    )
    .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(())
}

pub fn get_record(conn: &Connection, namespace: &str, key: &str) -> TandemResult<Option<Vec<u8>>> {
    conn.query_row(
        "SELECT body FROM records WHERE namespace = ?1 AND record_key = ?2",
        params![namespace, key],
        |row| row.get(0),
    )
    .optional()
    .map_err(|e| to_storage_err(e.to_string()))
}

pub fn delete_record(conn: &Connection, namespace: &str, key: &str) -> TandemResult<()> {
    conn.execute(
        "DELETE FROM records WHERE namespace = ?1 AND record_key = ?2",
        params![namespace, key],
    )
    .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(())
}

/// Delete several records in one transaction.
pub fn delete_records(conn: &Connection, namespace: &str, keys: &[String]) -> TandemResult<()> {
    let tx = conn
        .unchecked_transaction()
        .map_err(|e| to_storage_err(e.to_string()))?;
    {
        let mut stmt = tx
            .prepare_cached("DELETE FROM records WHERE namespace = ?1 AND record_key = ?2")
            .map_err(|e| to_storage_err(e.to_string()))?;
        for key in keys {
            stmt.execute(params![namespace, key])
                .map_err(|e| to_storage_err(e.to_string()))?;
        }
    }
    tx.commit().map_err(|e| to_storage_err(e.to_string()))?;
    Ok(())
}

/// All records of a namespace in first-write order.
pub fn scan_namespace(conn: &Connection, namespace: &str) -> TandemResult<Vec<(String, Vec<u8>)>> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT record_key, body FROM records WHERE namespace = ?1 ORDER BY rowid ASC",
        )
        .map_err(|e| to_storage_err(e.to_string()))?;
    let rows = stmt
        .query_map(params![namespace], |row| Ok((row.get(0)?, row.get(1)?)))
        .map_err(|e| to_storage_err(e.to_string()))?;
    rows.collect::<Result<Vec<_>, _>>()
        .map_err(|e| to_storage_err(e.to_string()))
}

pub fn count_namespace(conn: &Connection, namespace: &str) -> TandemResult<usize> {
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM records WHERE namespace = ?1",
            params![namespace],
            |row| row.get(0),
        )
        .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(count as usize)
}
