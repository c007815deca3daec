// src/db/progress.rs
//! Durable rotation bookkeeping: the run record and per-table checkpoints
//!
//! Every function takes a plain `&Connection` so callers can pass either the
//! connection or an open batch transaction.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::consts::{PROGRESS_TABLE, RUNS_TABLE};
use crate::enums::ProgressStatus;
use crate::error::{Result, RotationError};

/// One operator-initiated rotation. Written once, never updated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationRun {
    pub rotation_id: String,
    pub old_key_hash: String,
    pub new_key_hash: String,
    pub started_at: String,
    pub dry_run: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorLogEntry {
    pub record_id: i64,
    pub error: String,
    pub timestamp: String,
}

#[derive(Debug, Clone)]
pub struct TableProgress {
    pub id: i64,
    pub rotation_id: String,
    pub table_name: String,
    pub old_key_hash: String,
    pub new_key_hash: String,
    pub status: ProgressStatus,
    pub total_records: i64,
    pub processed_records: i64,
    pub failed_records: i64,
    pub last_checkpoint_id: Option<i64>,
    pub error_log: Vec<ErrorLogEntry>,
    pub started_at: String,
    pub completed_at: Option<String>,
}

/// Partial update. `None` leaves a column untouched; `append_errors` is
/// appended to the stored log, never replacing it.
#[derive(Debug, Clone, Default)]
pub struct ProgressUpdate {
    pub status: Option<ProgressStatus>,
    pub total_records: Option<i64>,
    pub processed_records: Option<i64>,
    pub failed_records: Option<i64>,
    pub last_checkpoint_id: Option<i64>,
    pub append_errors: Vec<ErrorLogEntry>,
    pub completed_at: Option<String>,
}

/// Record the run, or check that an existing record with this id was made
/// for the same key pair
pub fn record_run(conn: &Connection, run: &RotationRun) -> Result<RotationRun> {
    conn.execute(
        &format!(
            "INSERT OR IGNORE INTO {RUNS_TABLE}
                 (rotation_id, old_key_hash, new_key_hash, dry_run, started_at)
             VALUES (?1, ?2, ?3, ?4, ?5)"
        ),
        params![
            run.rotation_id,
            run.old_key_hash,
            run.new_key_hash,
            run.dry_run,
            run.started_at
        ],
    )?;

    let stored = conn.query_row(
        &format!(
            "SELECT rotation_id, old_key_hash, new_key_hash, started_at, dry_run
             FROM {RUNS_TABLE} WHERE rotation_id = ?1"
        ),
        [&run.rotation_id],
        |row| {
            Ok(RotationRun {
                rotation_id: row.get(0)?,
                old_key_hash: row.get(1)?,
                new_key_hash: row.get(2)?,
                started_at: row.get(3)?,
                dry_run: row.get(4)?,
            })
        },
    )?;

    if stored.old_key_hash != run.old_key_hash || stored.new_key_hash != run.new_key_hash {
        return Err(RotationError::Configuration(format!(
            "rotation `{}` was started with a different key pair",
            run.rotation_id
        )));
    }
    if stored.dry_run != run.dry_run {
        return Err(RotationError::Configuration(format!(
            "rotation `{}` cannot be shared between dry and live runs",
            run.rotation_id
        )));
    }
    Ok(stored)
}

/// Existing progress for `(rotation_id, table_name)`, or a fresh `in_progress` row
pub fn get_or_create(
    conn: &Connection,
    rotation_id: &str,
    table_name: &str,
    old_key_hash: &str,
    new_key_hash: &str,
) -> Result<TableProgress> {
    if let Some(existing) = find(conn, rotation_id, table_name)? {
        return Ok(existing);
    }

    conn.execute(
        &format!(
            "INSERT INTO {PROGRESS_TABLE}
                 (rotation_id, table_name, old_key_hash, new_key_hash, status, started_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)"
        ),
        params![
            rotation_id,
            table_name,
            old_key_hash,
            new_key_hash,
            ProgressStatus::InProgress,
            Utc::now().to_rfc3339()
        ],
    )?;
    load(conn, conn.last_insert_rowid())
}

pub fn find(conn: &Connection, rotation_id: &str, table_name: &str) -> Result<Option<TableProgress>> {
    let found = conn
        .query_row(
            &format!(
                "SELECT {PROGRESS_COLUMNS} FROM {PROGRESS_TABLE}
                 WHERE rotation_id = ?1 AND table_name = ?2"
            ),
            params![rotation_id, table_name],
            from_row,
        )
        .optional()?;
    found.map(finish).transpose()
}

pub fn load(conn: &Connection, progress_id: i64) -> Result<TableProgress> {
    let raw = conn.query_row(
        &format!("SELECT {PROGRESS_COLUMNS} FROM {PROGRESS_TABLE} WHERE id = ?1"),
        [progress_id],
        from_row,
    )?;
    finish(raw)
}

/// Merge `update` into the stored row and return the result
pub fn update(conn: &Connection, progress_id: i64, update: &ProgressUpdate) -> Result<TableProgress> {
    let mut current = load(conn, progress_id)?;

    if let Some(status) = update.status {
        current.status = status;
    }
    if let Some(total) = update.total_records {
        current.total_records = total;
    }
    if let Some(processed) = update.processed_records {
        current.processed_records = processed;
    }
    if let Some(failed) = update.failed_records {
        current.failed_records = failed;
    }
    // The checkpoint only ever moves forward
    if let Some(checkpoint) = update.last_checkpoint_id {
        current.last_checkpoint_id = Some(match current.last_checkpoint_id {
            Some(prev) => prev.max(checkpoint),
            None => checkpoint,
        });
    }
    current
        .error_log
        .extend(update.append_errors.iter().cloned());
    if update.completed_at.is_some() {
        current.completed_at = update.completed_at.clone();
    }

    conn.execute(
        &format!(
            "UPDATE {PROGRESS_TABLE} SET
                 status = ?1, total_records = ?2, processed_records = ?3,
                 failed_records = ?4, last_checkpoint_id = ?5, error_log = ?6,
                 completed_at = ?7
             WHERE id = ?8"
        ),
        params![
            current.status,
            current.total_records,
            current.processed_records,
            current.failed_records,
            current.last_checkpoint_id,
            serde_json::to_string(&current.error_log)?,
            current.completed_at,
            progress_id
        ],
    )?;
    Ok(current)
}

const PROGRESS_COLUMNS: &str = "id, rotation_id, table_name, old_key_hash, new_key_hash,
    status, total_records, processed_records, failed_records, last_checkpoint_id,
    error_log, started_at, completed_at";

// error_log is decoded outside the rusqlite row closure so JSON errors keep their type
fn from_row(row: &Row<'_>) -> rusqlite::Result<(TableProgress, String)> {
    Ok((
        TableProgress {
            id: row.get(0)?,
            rotation_id: row.get(1)?,
            table_name: row.get(2)?,
            old_key_hash: row.get(3)?,
            new_key_hash: row.get(4)?,
            status: row.get(5)?,
            total_records: row.get(6)?,
            processed_records: row.get(7)?,
            failed_records: row.get(8)?,
            last_checkpoint_id: row.get(9)?,
            error_log: Vec::new(),
            started_at: row.get(11)?,
            completed_at: row.get(12)?,
        },
        row.get(10)?,
    ))
}

fn finish((mut progress, error_log): (TableProgress, String)) -> Result<TableProgress> {
    progress.error_log = serde_json::from_str(&error_log)?;
    Ok(progress)
}
