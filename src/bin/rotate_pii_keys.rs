// src/bin/rotate_pii_keys.rs
//! Rotate the key protecting PII columns while the application keeps running

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::Parser;
use pii_key_rotation::config::{self, Config};
use pii_key_rotation::{audit, execute, PiiTable, RotationPlan, RunSummary};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "rotate-pii-keys")]
#[command(version, about = "Re-encrypt PII columns under a new key", long_about = None)]
struct Cli {
    /// Key the existing ciphertext was written with (at least 32 characters)
    #[arg(long, value_name = "KEY")]
    old_key: String,

    /// Key to re-encrypt with (at least 32 characters, different from --old-key)
    #[arg(long, value_name = "KEY")]
    new_key: String,

    /// Rows per transaction [default: from config, 100]
    #[arg(long, value_name = "N")]
    batch_size: Option<usize>,

    /// Do all the work, commit nothing
    #[arg(long)]
    dry_run: bool,

    /// Resume token; defaults to one derived from the key pair
    #[arg(long, value_name = "ID")]
    rotation_id: Option<String>,

    /// Only rotate these tables (repeatable)
    #[arg(long = "table", value_name = "NAME", value_parser = parse_table)]
    tables: Vec<PiiTable>,

    /// Revisit rows that failed earlier in this rotation
    #[arg(long)]
    retry_failed: bool,

    /// TOML config file [default: $PKR_CONFIG or key-rotation.toml]
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Debug-level console output
    #[arg(short, long)]
    verbose: bool,
}

fn parse_table(s: &str) -> std::result::Result<PiiTable, String> {
    s.parse().map_err(|e: pii_key_rotation::RotationError| e.to_string())
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::from(1),
            };
        }
    };

    init_tracing(cli.verbose);

    match run(cli) {
        Ok(summary) => {
            report(&summary);
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("rotation aborted: {err:#}");
            ExitCode::from(1)
        }
    }
}

fn run(cli: Cli) -> Result<RunSummary> {
    let config: Config = match &cli.config {
        Some(path) => config::load_from(path),
        None => config::load(),
    }
    .context("failed to load configuration")?;

    // Keys are validated here, before the datastore is opened
    let mut plan = RotationPlan::new(
        cli.old_key,
        cli.new_key,
        cli.batch_size.unwrap_or(config.rotation.default_batch_size),
        cli.dry_run,
    )?
    .with_tables(cli.tables)
    .with_retry_failed(cli.retry_failed);
    if let Some(id) = cli.rotation_id {
        plan = plan.with_rotation_id(id)?;
    }

    info!(
        rotation_id = %plan.rotation_id,
        dry_run = plan.is_dry_run(),
        batch_size = plan.batch_size,
        "starting key rotation"
    );

    let audit_log = audit::log_path(Path::new(&config.audit.log_dir), &plan.rotation_id);
    info!(path = %audit_log.display(), "audit trail");

    let summary = execute(&config, &plan)
        .with_context(|| format!("rotation `{}` failed", plan.rotation_id))?;
    Ok(summary)
}

fn report(summary: &RunSummary) {
    let mode = if summary.dry_run { "DRY RUN" } else { "LIVE" };
    println!("\n=== KEY ROTATION COMPLETE ({mode}) ===");
    println!("Rotation: {}", summary.rotation_id);
    for table in &summary.tables {
        println!(
            "{:<12} {:<10} total={} processed={} failed={}{}",
            table.table.to_string(),
            table.status.to_string(),
            table.total_records,
            table.processed_records,
            table.failed_records,
            if table.skipped { " (skipped)" } else { "" }
        );
    }
    if summary.tables.iter().any(|t| t.failed_records > 0) {
        println!("Some rows are still under the old key; rerun with --retry-failed once fixed.");
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();
}
