// src/db/retry_queue.rs
//! Failed record ids, kept apart from the forward cursor so a remediation
//! pass can revisit exactly those rows

use chrono::Utc;
use rusqlite::{params, Connection};

use crate::consts::RETRY_QUEUE_TABLE;

/// Queue a failed row, or bump its attempt count if already queued
pub fn enqueue(
    conn: &Connection,
    rotation_id: &str,
    table_name: &str,
    record_id: i64,
    error: &str,
) -> rusqlite::Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO {RETRY_QUEUE_TABLE}
                 (rotation_id, table_name, record_id, attempts, last_error, queued_at)
             VALUES (?1, ?2, ?3, 1, ?4, ?5)
             ON CONFLICT(rotation_id, table_name, record_id) DO UPDATE SET
                 attempts = attempts + 1,
                 last_error = excluded.last_error,
                 resolved_at = NULL"
        ),
        params![rotation_id, table_name, record_id, error, Utc::now().to_rfc3339()],
    )?;
    Ok(())
}

/// Unresolved ids, ascending
pub fn pending_ids(
    conn: &Connection,
    rotation_id: &str,
    table_name: &str,
) -> rusqlite::Result<Vec<i64>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT record_id FROM {RETRY_QUEUE_TABLE}
         WHERE rotation_id = ?1 AND table_name = ?2 AND resolved_at IS NULL
         ORDER BY record_id ASC"
    ))?;
    let ids = stmt.query_map(params![rotation_id, table_name], |row| row.get(0))?;
    ids.collect()
}

pub fn resolve(
    conn: &Connection,
    rotation_id: &str,
    table_name: &str,
    record_ids: &[i64],
) -> rusqlite::Result<()> {
    let now = Utc::now().to_rfc3339();
    let mut stmt = conn.prepare(&format!(
        "UPDATE {RETRY_QUEUE_TABLE} SET resolved_at = ?1
         WHERE rotation_id = ?2 AND table_name = ?3 AND record_id = ?4"
    ))?;
    for id in record_ids {
        stmt.execute(params![now, rotation_id, table_name, id])?;
    }
    Ok(())
}

/// `(record_id, attempts)` for every queued row, resolved or not
pub fn attempts(
    conn: &Connection,
    rotation_id: &str,
    table_name: &str,
) -> rusqlite::Result<Vec<(i64, i64)>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT record_id, attempts FROM {RETRY_QUEUE_TABLE}
         WHERE rotation_id = ?1 AND table_name = ?2
         ORDER BY record_id ASC"
    ))?;
    let rows = stmt.query_map(params![rotation_id, table_name], |row| {
        Ok((row.get(0)?, row.get(1)?))
    })?;
    rows.collect()
}
