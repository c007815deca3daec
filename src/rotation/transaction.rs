// src/rotation/transaction.rs
//! One batch = one transaction
//!
//! Live: the staged UPDATEs and the caller's checkpoint write commit together.
//! Dry-run: the same UPDATEs run and are then rolled back; the checkpoint is
//! written afterwards on the bare connection.

use rusqlite::Connection;
use tracing::debug;

use super::processor::{process_batch, BatchOutcome};
use crate::crypto::DatastoreCipher;
use crate::db::fetch::update_row;
use crate::db::BatchWorkItem;
use crate::enums::RunMode;
use crate::error::{Result, RotationError};
use crate::keys::RotationKeys;
use crate::registry::TableSpec;

pub fn run_batch<F>(
    conn: &mut Connection,
    spec: &'static TableSpec,
    rows: &[BatchWorkItem],
    keys: &RotationKeys,
    mode: RunMode,
    checkpoint: F,
) -> Result<BatchOutcome>
where
    F: FnOnce(&Connection, &BatchOutcome) -> Result<()>,
{
    let tx = conn
        .transaction()
        .map_err(|e| RotationError::batch(spec.table, e))?;

    let batch = {
        let cipher = DatastoreCipher::new(&*tx);
        process_batch(&cipher, spec, rows, keys, mode)?
    };

    for update in &batch.updates {
        let changed = update_row(&tx, spec, update.id, &update.columns)
            .map_err(|e| RotationError::batch(spec.table, e))?;
        if changed == 0 {
            debug!(table = spec.table, record_id = update.id, "row vanished before update");
        }
    }

    match mode {
        RunMode::Live => {
            checkpoint(&*tx, &batch.outcome)?;
            tx.commit()
                .map_err(|e| RotationError::batch(spec.table, e))?;
        }
        RunMode::DryRun => {
            tx.rollback()
                .map_err(|e| RotationError::batch(spec.table, e))?;
            checkpoint(&*conn, &batch.outcome)?;
        }
    }

    Ok(batch.outcome)
}
