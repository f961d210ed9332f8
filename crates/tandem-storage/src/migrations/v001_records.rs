//! v001: namespaced records table.

use rusqlite::Connection;

use tandem_core::errors::TandemResult;

use crate::to_storage_err;

pub fn migrate(conn: &Connection) -> TandemResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS records (
            namespace   TEXT NOT NULL,
            record_key  TEXT NOT NULL,
            body        BLOB NOT NULL,
            updated_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
            PRIMARY KEY (namespace, record_key)
        );
        ",
    )
    .map_err(|e| to_storage_err(e.to_string()))?;
    Ok(())
}
