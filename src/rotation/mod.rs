// src/rotation/mod.rs
//! The rotation engine: row processing, batch transactions and orchestration

pub mod orchestrator;
pub mod processor;
pub mod transaction;

pub use orchestrator::{execute, RotationPlan, Rotator, RunSummary, TableSummary};
pub use processor::{process_batch, BatchOutcome, ProcessedBatch, RowFailure, StagedUpdate};
pub use transaction::run_batch;
