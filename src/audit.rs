// src/audit.rs
//! Append-only audit trail
//!
//! One JSON object per line in `<log_dir>/key-rotation-<rotation_id>.log`,
//! flushed after every event and mirrored to the console through `tracing`.
//! Events carry counts, ids and truncated key digests only. Never
//! plaintext, never key material.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::consts::AUDIT_TARGET;
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuditEvent {
    RunStarted {
        dry_run: bool,
        batch_size: usize,
        old_key_hash: String,
        new_key_hash: String,
        tables: Vec<String>,
    },
    TableStarted {
        table: String,
        total_records: i64,
        resume_after: Option<i64>,
    },
    TableSkipped {
        table: String,
        reason: String,
    },
    BatchCompleted {
        table: String,
        batch: u64,
        rows: usize,
        processed: usize,
        failed: usize,
        checkpoint: Option<i64>,
        committed: bool,
    },
    RowFailed {
        table: String,
        record_id: i64,
        error: String,
    },
    TableCompleted {
        table: String,
        total_records: i64,
        processed_records: i64,
        failed_records: i64,
        batches: u64,
    },
    DryRunVerified {
        table: String,
        checksum: String,
        unchanged: bool,
    },
    RetryPassCompleted {
        table: String,
        attempted: usize,
        resolved: usize,
        still_failing: usize,
    },
    RunCompleted {
        tables: usize,
        exit_code: i32,
    },
    RunFailed {
        error: String,
        exit_code: i32,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub timestamp: String,
    pub rotation_id: String,
    pub dry_run: bool,
    #[serde(flatten)]
    pub event: AuditEvent,
}

pub struct AuditLogger {
    rotation_id: String,
    dry_run: bool,
    sink: Option<File>,
    records: Vec<AuditRecord>,
}

impl AuditLogger {
    /// Open (or reopen, on resume) the run's log file in append mode
    pub fn open(log_dir: &Path, rotation_id: &str, dry_run: bool) -> Result<Self> {
        fs::create_dir_all(log_dir)?;
        let path = log_path(log_dir, rotation_id);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            rotation_id: rotation_id.to_string(),
            dry_run,
            sink: Some(file),
            records: Vec::new(),
        })
    }

    /// Console + in-memory only
    pub fn console_only(rotation_id: &str, dry_run: bool) -> Self {
        Self {
            rotation_id: rotation_id.to_string(),
            dry_run,
            sink: None,
            records: Vec::new(),
        }
    }

    pub fn record(&mut self, event: AuditEvent) -> Result<()> {
        let record = AuditRecord {
            timestamp: Utc::now().to_rfc3339(),
            rotation_id: self.rotation_id.clone(),
            dry_run: self.dry_run,
            event,
        };
        let line = serde_json::to_string(&record)?;

        if let Some(file) = self.sink.as_mut() {
            writeln!(file, "{line}")?;
            file.flush()?;
        }

        match &record.event {
            AuditEvent::RowFailed { .. } => warn!(target: AUDIT_TARGET, "{line}"),
            AuditEvent::RunFailed { .. } => error!(target: AUDIT_TARGET, "{line}"),
            _ => info!(target: AUDIT_TARGET, "{line}"),
        }

        self.records.push(record);
        Ok(())
    }

    /// Events recorded by this logger instance, oldest first
    pub fn records(&self) -> &[AuditRecord] {
        &self.records
    }
}

pub fn log_path(log_dir: &Path, rotation_id: &str) -> PathBuf {
    log_dir.join(format!("key-rotation-{rotation_id}.log"))
}

/// Parse a log file back into records (verification tooling, tests)
pub fn read_log(path: &Path) -> Result<Vec<AuditRecord>> {
    let content = fs::read_to_string(path)?;
    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).map_err(Into::into))
        .collect()
}
