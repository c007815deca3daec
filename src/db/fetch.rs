// src/db/fetch.rs
//! Keyset-paginated reads over a registered table
//!
//! Windows are keyed on the primary key (`id > checkpoint ORDER BY id LIMIT n`)
//! rather than an offset, so already-scanned rows are never revisited.

use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};

use crate::registry::TableSpec;

/// One row's ciphertext, in `TableSpec::fields` order. Lives for one batch only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchWorkItem {
    pub id: i64,
    pub values: Vec<Option<Vec<u8>>>,
}

/// Up to `limit` qualifying rows with `id > after_id`, ascending by id
pub fn fetch_batch(
    conn: &Connection,
    spec: &TableSpec,
    after_id: Option<i64>,
    limit: usize,
) -> rusqlite::Result<Vec<BatchWorkItem>> {
    let base = select_qualifying(spec);
    let id = spec.id_field;
    // a negative LIMIT means unbounded in SQLite, so never let the cast wrap
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);

    match after_id {
        Some(after) => {
            let sql = format!("{base} AND {id} > ?1 ORDER BY {id} ASC LIMIT ?2");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![after, limit], |row| work_item(row, spec))?;
            rows.collect()
        }
        None => {
            let sql = format!("{base} ORDER BY {id} ASC LIMIT ?1");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([limit], |row| work_item(row, spec))?;
            rows.collect()
        }
    }
}

/// Specific rows by id (remediation pass). Rows that no longer qualify are omitted.
pub fn fetch_by_ids(
    conn: &Connection,
    spec: &TableSpec,
    ids: &[i64],
) -> rusqlite::Result<Vec<BatchWorkItem>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let placeholders = vec!["?"; ids.len()].join(", ");
    let id = spec.id_field;
    let sql = format!(
        "{} AND {id} IN ({placeholders}) ORDER BY {id} ASC",
        select_qualifying(spec)
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(ids.iter()), |row| work_item(row, spec))?;
    rows.collect()
}

/// Qualifying rows still ahead of the checkpoint
pub fn count_qualifying(
    conn: &Connection,
    spec: &TableSpec,
    after_id: Option<i64>,
) -> rusqlite::Result<i64> {
    let base = format!("SELECT COUNT(*) FROM {} WHERE ({})", spec.table, any_not_null(spec));
    match after_id {
        Some(after) => conn.query_row(
            &format!("{base} AND {} > ?1", spec.id_field),
            [after],
            |row| row.get(0),
        ),
        None => conn.query_row(&base, [], |row| row.get(0)),
    }
}

/// Write re-encrypted columns for one row. Only the named columns are touched.
pub fn update_row(
    conn: &Connection,
    spec: &TableSpec,
    id: i64,
    columns: &[(&'static str, Vec<u8>)],
) -> rusqlite::Result<usize> {
    if columns.is_empty() {
        return Ok(0);
    }
    let assignments = columns
        .iter()
        .enumerate()
        .map(|(i, (column, _))| format!("{column} = ?{}", i + 1))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "UPDATE {} SET {assignments} WHERE {} = ?{}",
        spec.table,
        spec.id_field,
        columns.len() + 1
    );

    let mut values: Vec<Value> = columns
        .iter()
        .map(|(_, ciphertext)| Value::Blob(ciphertext.clone()))
        .collect();
    values.push(Value::Integer(id));
    conn.execute(&sql, params_from_iter(values.iter()))
}

fn select_qualifying(spec: &TableSpec) -> String {
    format!(
        "SELECT {}, {} FROM {} WHERE ({})",
        spec.id_field,
        spec.fields.join(", "),
        spec.table,
        any_not_null(spec)
    )
}

fn any_not_null(spec: &TableSpec) -> String {
    spec.fields
        .iter()
        .map(|field| format!("{field} IS NOT NULL"))
        .collect::<Vec<_>>()
        .join(" OR ")
}

fn work_item(row: &Row<'_>, spec: &TableSpec) -> rusqlite::Result<BatchWorkItem> {
    let mut values = Vec::with_capacity(spec.fields.len());
    for i in 0..spec.fields.len() {
        values.push(row.get(i + 1)?);
    }
    Ok(BatchWorkItem {
        id: row.get(0)?,
        values,
    })
}
