// src/db/conn.rs
use std::{fs, path::Path};

use rusqlite::Connection;
use tracing::{info, warn};

use crate::config::Config;
use crate::consts::{PROGRESS_TABLE, RETRY_QUEUE_TABLE, RUNS_TABLE};
use crate::crypto::{register_cipher_functions, AesCryptCipher};
use crate::error::{Result, RotationError};

/// Open the application datastore, unlock it, install the cipher capability
/// and make sure the engine's own tables exist
pub fn open_datastore(config: &Config) -> Result<Connection> {
    let db_path = &config.datastore.path;

    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let conn = Connection::open(db_path).map_err(RotationError::Connectivity)?;

    match config.datastore.key.as_deref() {
        Some(key) => {
            conn.execute_batch(&format!("PRAGMA key = '{}';", key.replace('\'', "''")))
                .map_err(RotationError::Connectivity)?;
        }
        None => warn!(
            path = %db_path,
            "datastore opened without an at-rest key"
        ),
    }

    // SQLCipher only checks the key on first page read
    conn.query_row("SELECT count(*) FROM sqlite_master", [], |row| {
        row.get::<_, i64>(0)
    })
    .map_err(RotationError::Connectivity)?;

    register_cipher_functions(&conn, AesCryptCipher::new(config.rotation.kdf_iterations))?;
    ensure_schema(&conn)?;

    info!(path = %db_path, "datastore ready");
    Ok(conn)
}

/// Create the engine-owned tables. Idempotent.
pub fn ensure_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {RUNS_TABLE} (
            rotation_id   TEXT PRIMARY KEY,
            old_key_hash  TEXT NOT NULL,
            new_key_hash  TEXT NOT NULL,
            dry_run       INTEGER NOT NULL,
            started_at    TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS {PROGRESS_TABLE} (
            id                 INTEGER PRIMARY KEY AUTOINCREMENT,
            rotation_id        TEXT NOT NULL,
            table_name         TEXT NOT NULL,
            old_key_hash       TEXT NOT NULL,
            new_key_hash       TEXT NOT NULL,
            status             TEXT NOT NULL DEFAULT 'pending',
            total_records      INTEGER NOT NULL DEFAULT 0,
            processed_records  INTEGER NOT NULL DEFAULT 0,
            failed_records     INTEGER NOT NULL DEFAULT 0,
            last_checkpoint_id INTEGER,
            error_log          TEXT NOT NULL DEFAULT '[]',
            started_at         TEXT NOT NULL,
            completed_at       TEXT,
            UNIQUE (rotation_id, table_name)
        );

        CREATE TABLE IF NOT EXISTS {RETRY_QUEUE_TABLE} (
            rotation_id  TEXT NOT NULL,
            table_name   TEXT NOT NULL,
            record_id    INTEGER NOT NULL,
            attempts     INTEGER NOT NULL DEFAULT 1,
            last_error   TEXT NOT NULL,
            queued_at    TEXT NOT NULL,
            resolved_at  TEXT,
            PRIMARY KEY (rotation_id, table_name, record_id)
        );

        CREATE INDEX IF NOT EXISTS idx_retry_queue_pending
            ON {RETRY_QUEUE_TABLE}(rotation_id, table_name, resolved_at);
        "#
    ))
}
