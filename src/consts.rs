// src/consts.rs
//! Shared constants: security parameters and defaults

/// Rows per batch transaction when `--batch-size` is not given
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Minimum accepted length of an operator-supplied key, in characters
pub const MIN_KEY_LENGTH: usize = 32;

/// Hex characters of the SHA-256 key digest that may appear in logs
pub const KEY_HASH_PREFIX_LEN: usize = 16;

/// PBKDF2 iterations used by `pii_encrypt` for newly written ciphertext
// Decryption reads the count from the AES Crypt header, so old data is unaffected
pub const DEFAULT_KDF_ITERATIONS: u32 = 10_000;

/// SQL function names of the datastore cipher capability
pub const SQL_ENCRYPT_FN: &str = "pii_encrypt";
pub const SQL_DECRYPT_FN: &str = "pii_decrypt";

/// Engine-owned tables
pub const RUNS_TABLE: &str = "key_rotation_runs";
pub const PROGRESS_TABLE: &str = "key_rotation_progress";
pub const RETRY_QUEUE_TABLE: &str = "key_rotation_retry_queue";

/// `tracing` target of the mirrored audit stream
pub const AUDIT_TARGET: &str = "audit";

/// Header magic for AES-Crypt v3 payloads
pub const AESCRYPT_V3_HEADER: &[u8; 5] = b"AES\x03\x00";
