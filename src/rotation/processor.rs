// src/rotation/processor.rs
//! Per-row decrypt → encrypt pipeline
//!
//! A row is all-or-nothing: if any of its fields fails, no column of that row
//! is staged and the row stays under the old key. Only datastore failures
//! escape this module; crypto failures become [`RowFailure`]s.

use tracing::{debug, warn};

use crate::crypto::Cipher;
use crate::db::BatchWorkItem;
use crate::enums::RunMode;
use crate::error::{CipherError, CryptoOp, Result, RotationError, RowCryptoError};
use crate::keys::RotationKeys;
use crate::registry::TableSpec;

/// New ciphertext for the fields of one row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedUpdate {
    pub id: i64,
    pub columns: Vec<(&'static str, Vec<u8>)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowFailure {
    pub record_id: i64,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub processed: usize,
    pub failed: usize,
    pub errors: Vec<RowFailure>,
    /// Highest id scanned in this batch
    pub last_id: Option<i64>,
}

#[derive(Debug, Default)]
pub struct ProcessedBatch {
    pub outcome: BatchOutcome,
    pub updates: Vec<StagedUpdate>,
}

enum RowError {
    Crypto(RowCryptoError),
    Datastore(rusqlite::Error),
}

pub fn process_batch(
    cipher: &dyn Cipher,
    spec: &'static TableSpec,
    rows: &[BatchWorkItem],
    keys: &RotationKeys,
    mode: RunMode,
) -> Result<ProcessedBatch> {
    let mut batch = ProcessedBatch::default();

    for row in rows {
        batch.outcome.last_id = Some(row.id);

        match reencrypt_row(cipher, spec, row, keys) {
            Ok(Some(update)) => {
                if mode.is_dry_run() {
                    debug!(
                        table = spec.table,
                        record_id = row.id,
                        columns = update.columns.len(),
                        "dry-run: would re-encrypt row"
                    );
                }
                batch.updates.push(update);
                batch.outcome.processed += 1;
            }
            // nothing to rotate
            Ok(None) => batch.outcome.processed += 1,
            Err(RowError::Crypto(err)) => {
                warn!(table = spec.table, record_id = row.id, error = %err, "row left under old key");
                batch.outcome.failed += 1;
                batch.outcome.errors.push(RowFailure {
                    record_id: row.id,
                    error: err.to_string(),
                });
            }
            Err(RowError::Datastore(source)) => {
                return Err(RotationError::batch(spec.table, source));
            }
        }
    }

    Ok(batch)
}

fn reencrypt_row(
    cipher: &dyn Cipher,
    spec: &'static TableSpec,
    row: &BatchWorkItem,
    keys: &RotationKeys,
) -> std::result::Result<Option<StagedUpdate>, RowError> {
    let mut columns = Vec::new();

    for (column, value) in spec.fields.iter().zip(&row.values) {
        let Some(ciphertext) = value.as_deref().filter(|ct| !ct.is_empty()) else {
            continue;
        };

        let plaintext = cipher
            .decrypt(ciphertext, keys.old_key())
            .map_err(|e| classify(e, column, CryptoOp::Decrypt))?;
        let rotated = cipher
            .encrypt(&plaintext, keys.new_key())
            .map_err(|e| classify(e, column, CryptoOp::Encrypt))?;
        columns.push((*column, rotated));
    }

    Ok((!columns.is_empty()).then_some(StagedUpdate {
        id: row.id,
        columns,
    }))
}

fn classify(err: CipherError, column: &'static str, operation: CryptoOp) -> RowError {
    match err {
        CipherError::Rejected(reason) => RowError::Crypto(RowCryptoError {
            column,
            operation,
            reason,
        }),
        CipherError::Datastore(source) => RowError::Datastore(source),
    }
}
