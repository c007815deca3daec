// src/db/mod.rs
//! Datastore access: connection setup, progress tracking, batch reads and the retry queue

pub mod conn;
pub mod fetch;
pub mod progress;
pub mod retry_queue;

pub use conn::{ensure_schema, open_datastore};
pub use fetch::{count_qualifying, fetch_batch, fetch_by_ids, BatchWorkItem};
pub use progress::{ErrorLogEntry, ProgressUpdate, RotationRun, TableProgress};
