// src/lib.rs
//! pii-key-rotation: online re-encryption of PII columns under a new key
//!
//! Features:
//! - Keyset-paginated batches, one transaction each
//! - Durable per-table checkpoints; restarts resume instead of re-scanning
//! - Row-level failure isolation with a retry queue
//! - Dry runs that roll back every write and prove it with checksums
//! - Append-only JSON audit trail with redacted key digests

pub mod aliases;
pub mod audit;
pub mod config;
pub mod consts;
pub mod crypto;
pub mod db;
pub mod enums;
pub mod error;
pub mod keys;
pub mod registry;
pub mod rotation;
pub mod verify;

// Re-export everything users need at the crate root
pub use aliases::{PlainText, RotationKey};
pub use audit::{AuditEvent, AuditLogger, AuditRecord};
pub use config::load as load_config;
pub use crypto::{AesCryptCipher, Cipher, DatastoreCipher};
pub use enums::{ProgressStatus, RunMode};
pub use error::{CipherError, RotationError, RowCryptoError};
pub use keys::{key_hash, RotationKeys};
pub use registry::{PiiTable, TableSpec};
pub use rotation::{execute, RotationPlan, Rotator, RunSummary, TableSummary};
