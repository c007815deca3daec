// src/rotation/orchestrator.rs
//! Drives registry → fetch → process → commit → checkpoint, one table at a
//! time, strictly in order

use std::path::Path;

use chrono::Utc;
use rusqlite::Connection;
use tracing::{info, warn};

use super::transaction::run_batch;
use crate::audit::{AuditEvent, AuditLogger};
use crate::config::Config;
use crate::db::progress::{self, ErrorLogEntry, ProgressUpdate, RotationRun, TableProgress};
use crate::db::{fetch, open_datastore, retry_queue};
use crate::enums::{ProgressStatus, RunMode};
use crate::error::{Result, RotationError};
use crate::keys::RotationKeys;
use crate::registry::PiiTable;
use crate::verify::ciphertext_checksum;

/// Everything a run needs, validated up front
#[derive(Debug, Clone)]
pub struct RotationPlan {
    pub rotation_id: String,
    pub keys: RotationKeys,
    pub batch_size: usize,
    pub mode: RunMode,
    pub tables: Vec<PiiTable>,
    pub retry_failed: bool,
}

impl RotationPlan {
    /// Validates keys and batch size. Never touches the datastore.
    pub fn new(old_key: String, new_key: String, batch_size: usize, dry_run: bool) -> Result<Self> {
        let keys = RotationKeys::new(old_key, new_key)?;
        if batch_size == 0 || i64::try_from(batch_size).is_err() {
            return Err(RotationError::Configuration(format!(
                "--batch-size must be a positive integer no larger than {}",
                i64::MAX
            )));
        }
        let mode = RunMode::from_dry_run(dry_run);
        let rotation_id = match mode {
            RunMode::Live => keys.derived_rotation_id(),
            // dry runs never share progress rows with the live rotation or
            // with each other, even when started within the same second
            RunMode::DryRun => {
                let now = Utc::now();
                format!(
                    "dry-{}-{}",
                    keys.derived_rotation_id().trim_start_matches("rot-"),
                    now.timestamp_nanos_opt().unwrap_or_else(|| now.timestamp_micros())
                )
            }
        };

        Ok(Self {
            rotation_id,
            keys,
            batch_size,
            mode,
            tables: PiiTable::ALL.to_vec(),
            retry_failed: false,
        })
    }

    pub fn with_rotation_id(mut self, rotation_id: impl Into<String>) -> Result<Self> {
        let rotation_id = rotation_id.into();
        if rotation_id.is_empty()
            || !rotation_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(RotationError::Configuration(
                "--rotation-id may only contain ASCII letters, digits, '-' and '_'".into(),
            ));
        }
        self.rotation_id = rotation_id;
        Ok(self)
    }

    pub fn with_tables(mut self, tables: Vec<PiiTable>) -> Self {
        if !tables.is_empty() {
            let mut ordered = Vec::with_capacity(tables.len());
            for table in tables {
                if !ordered.contains(&table) {
                    ordered.push(table);
                }
            }
            self.tables = ordered;
        }
        self
    }

    pub fn with_retry_failed(mut self, retry_failed: bool) -> Self {
        self.retry_failed = retry_failed;
        self
    }

    pub fn is_dry_run(&self) -> bool {
        self.mode.is_dry_run()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSummary {
    pub table: PiiTable,
    pub status: ProgressStatus,
    pub total_records: i64,
    pub processed_records: i64,
    pub failed_records: i64,
    pub last_checkpoint_id: Option<i64>,
    /// Batches run by this invocation
    pub batches: u64,
    pub skipped: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub rotation_id: String,
    pub dry_run: bool,
    pub tables: Vec<TableSummary>,
}

/// Full run: open the audit log, connect, rotate, record the terminal outcome
pub fn execute(config: &Config, plan: &RotationPlan) -> Result<RunSummary> {
    let mut audit = AuditLogger::open(
        Path::new(&config.audit.log_dir),
        &plan.rotation_id,
        plan.is_dry_run(),
    )?;

    let result = open_datastore(config)
        .and_then(|mut conn| Rotator::new(&mut conn, plan, &mut audit).run());

    if let Err(err) = &result {
        audit.record(AuditEvent::RunFailed {
            error: err.to_string(),
            exit_code: err.exit_code(),
        })?;
    }
    result
}

pub struct Rotator<'a> {
    conn: &'a mut Connection,
    plan: &'a RotationPlan,
    audit: &'a mut AuditLogger,
}

impl<'a> Rotator<'a> {
    pub fn new(conn: &'a mut Connection, plan: &'a RotationPlan, audit: &'a mut AuditLogger) -> Self {
        Self { conn, plan, audit }
    }

    /// Rotate every planned table. Stops at the first fatal error.
    pub fn run(&mut self) -> Result<RunSummary> {
        let plan = self.plan;

        progress::record_run(
            self.conn,
            &RotationRun {
                rotation_id: plan.rotation_id.clone(),
                old_key_hash: plan.keys.old_hash().to_string(),
                new_key_hash: plan.keys.new_hash().to_string(),
                started_at: Utc::now().to_rfc3339(),
                dry_run: plan.is_dry_run(),
            },
        )?;

        self.audit.record(AuditEvent::RunStarted {
            dry_run: plan.is_dry_run(),
            batch_size: plan.batch_size,
            old_key_hash: plan.keys.old_hash().to_string(),
            new_key_hash: plan.keys.new_hash().to_string(),
            tables: plan.tables.iter().map(|t| t.to_string()).collect(),
        })?;

        let mut tables = Vec::with_capacity(plan.tables.len());
        for &table in &plan.tables {
            tables.push(self.rotate_table(table)?);
        }

        self.audit.record(AuditEvent::RunCompleted {
            tables: tables.len(),
            exit_code: 0,
        })?;

        Ok(RunSummary {
            rotation_id: plan.rotation_id.clone(),
            dry_run: plan.is_dry_run(),
            tables,
        })
    }

    fn rotate_table(&mut self, table: PiiTable) -> Result<TableSummary> {
        let plan = self.plan;
        let spec = table.spec();

        let mut current = progress::get_or_create(
            self.conn,
            &plan.rotation_id,
            spec.table,
            plan.keys.old_hash(),
            plan.keys.new_hash(),
        )?;

        if current.status == ProgressStatus::Completed {
            self.audit.record(AuditEvent::TableSkipped {
                table: spec.table.to_string(),
                reason: "already completed for this rotation".into(),
            })?;
            if plan.retry_failed {
                current = self.remediate(table, current)?;
            }
            return Ok(summary(table, &current, 0, true));
        }

        let checksum_before = match plan.mode {
            RunMode::DryRun => Some(ciphertext_checksum(self.conn, spec)?),
            RunMode::Live => None,
        };

        let remaining = fetch::count_qualifying(self.conn, spec, current.last_checkpoint_id)?;
        current = progress::update(
            self.conn,
            current.id,
            &ProgressUpdate {
                status: Some(ProgressStatus::InProgress),
                total_records: Some(current.processed_records + current.failed_records + remaining),
                ..Default::default()
            },
        )?;

        info!(
            table = spec.table,
            total = current.total_records,
            resume_after = ?current.last_checkpoint_id,
            "rotating table"
        );
        self.audit.record(AuditEvent::TableStarted {
            table: spec.table.to_string(),
            total_records: current.total_records,
            resume_after: current.last_checkpoint_id,
        })?;

        let mut batches = 0u64;
        loop {
            let rows = fetch::fetch_batch(self.conn, spec, current.last_checkpoint_id, plan.batch_size)?;
            if rows.is_empty() {
                break;
            }
            batches += 1;

            let progress_id = current.id;
            let (processed_so_far, failed_so_far) = (current.processed_records, current.failed_records);
            let mut updated: Option<TableProgress> = None;

            let outcome = run_batch(self.conn, spec, &rows, &plan.keys, plan.mode, |conn, outcome| {
                let now = Utc::now().to_rfc3339();
                for failure in &outcome.errors {
                    retry_queue::enqueue(conn, &plan.rotation_id, spec.table, failure.record_id, &failure.error)?;
                }
                updated = Some(progress::update(
                    conn,
                    progress_id,
                    &ProgressUpdate {
                        processed_records: Some(processed_so_far + outcome.processed as i64),
                        failed_records: Some(failed_so_far + outcome.failed as i64),
                        last_checkpoint_id: outcome.last_id,
                        append_errors: outcome
                            .errors
                            .iter()
                            .map(|f| ErrorLogEntry {
                                record_id: f.record_id,
                                error: f.error.clone(),
                                timestamp: now.clone(),
                            })
                            .collect(),
                        ..Default::default()
                    },
                )?);
                Ok(())
            })?;

            if let Some(progress) = updated {
                current = progress;
            }

            for failure in &outcome.errors {
                self.audit.record(AuditEvent::RowFailed {
                    table: spec.table.to_string(),
                    record_id: failure.record_id,
                    error: failure.error.clone(),
                })?;
            }
            self.audit.record(AuditEvent::BatchCompleted {
                table: spec.table.to_string(),
                batch: batches,
                rows: rows.len(),
                processed: outcome.processed,
                failed: outcome.failed,
                checkpoint: current.last_checkpoint_id,
                committed: !plan.is_dry_run(),
            })?;

            if rows.len() < plan.batch_size {
                break;
            }
        }

        current = progress::update(
            self.conn,
            current.id,
            &ProgressUpdate {
                status: Some(ProgressStatus::Completed),
                completed_at: Some(Utc::now().to_rfc3339()),
                ..Default::default()
            },
        )?;

        self.audit.record(AuditEvent::TableCompleted {
            table: spec.table.to_string(),
            total_records: current.total_records,
            processed_records: current.processed_records,
            failed_records: current.failed_records,
            batches,
        })?;

        if let Some(before) = checksum_before {
            let after = ciphertext_checksum(self.conn, spec)?;
            let unchanged = before == after;
            if !unchanged {
                warn!(table = spec.table, "ciphertext changed during dry run (concurrent writer?)");
            }
            self.audit.record(AuditEvent::DryRunVerified {
                table: spec.table.to_string(),
                checksum: after,
                unchanged,
            })?;
        }

        if plan.retry_failed {
            current = self.remediate(table, current)?;
        }

        Ok(summary(table, &current, batches, false))
    }

    /// Re-run the queued failures of one table through the batch coordinator
    fn remediate(&mut self, table: PiiTable, mut current: TableProgress) -> Result<TableProgress> {
        let plan = self.plan;
        let spec = table.spec();
        let pending = retry_queue::pending_ids(self.conn, &plan.rotation_id, spec.table)?;

        let mut resolved_total = 0usize;
        let mut still_failing = 0usize;

        for chunk in pending.chunks(plan.batch_size) {
            let rows = fetch::fetch_by_ids(self.conn, spec, chunk)?;
            let progress_id = current.id;
            let (processed_so_far, failed_so_far) = (current.processed_records, current.failed_records);
            let mut updated: Option<TableProgress> = None;
            let mut resolved_here = 0usize;

            let outcome = run_batch(self.conn, spec, &rows, &plan.keys, plan.mode, |conn, outcome| {
                // ids that vanished or no longer qualify resolve as no-ops
                let resolved: Vec<i64> = chunk
                    .iter()
                    .copied()
                    .filter(|id| !outcome.errors.iter().any(|f| f.record_id == *id))
                    .collect();
                retry_queue::resolve(conn, &plan.rotation_id, spec.table, &resolved)?;
                for failure in &outcome.errors {
                    retry_queue::enqueue(conn, &plan.rotation_id, spec.table, failure.record_id, &failure.error)?;
                }
                resolved_here = resolved.len();
                let moved = resolved.len() as i64;
                updated = Some(progress::update(
                    conn,
                    progress_id,
                    &ProgressUpdate {
                        processed_records: Some(processed_so_far + moved),
                        failed_records: Some((failed_so_far - moved).max(0)),
                        ..Default::default()
                    },
                )?);
                Ok(())
            })?;

            if let Some(progress) = updated {
                current = progress;
            }
            resolved_total += resolved_here;
            still_failing += outcome.failed;
        }

        self.audit.record(AuditEvent::RetryPassCompleted {
            table: spec.table.to_string(),
            attempted: pending.len(),
            resolved: resolved_total,
            still_failing,
        })?;
        Ok(current)
    }
}

fn summary(table: PiiTable, progress: &TableProgress, batches: u64, skipped: bool) -> TableSummary {
    TableSummary {
        table,
        status: progress.status,
        total_records: progress.total_records,
        processed_records: progress.processed_records,
        failed_records: progress.failed_records,
        last_checkpoint_id: progress.last_checkpoint_id,
        batches,
        skipped,
    }
}
