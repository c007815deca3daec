// src/error.rs
//! Public error types for the entire crate

use thiserror::Error;

/// Fatal errors. Anything of this type terminates the run with exit code 1.
#[derive(Error, Debug)]
pub enum RotationError {
    /// Missing, too-short or identical keys, bad batch size, unreadable config.
    /// Always raised before the datastore is contacted.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Datastore unreachable, or its at-rest key was rejected
    #[error("datastore connectivity error: {0}")]
    Connectivity(#[source] rusqlite::Error),

    /// Unexpected datastore failure while a batch transaction was open
    #[error("batch transaction failed for table `{table}`: {source}")]
    BatchTransaction {
        table: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    #[error("datastore error: {0}")]
    Datastore(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RotationError {
    /// Process exit code for this failure
    pub fn exit_code(&self) -> i32 {
        1
    }

    pub(crate) fn batch(table: &'static str, source: rusqlite::Error) -> Self {
        RotationError::BatchTransaction { table, source }
    }
}

/// Error surfaced by a [`crate::crypto::Cipher`] implementation
#[derive(Error, Debug)]
pub enum CipherError {
    /// The primitive refused the input: wrong key, corrupt or truncated ciphertext
    #[error("{0}")]
    Rejected(String),

    /// The datastore call carrying the crypto operation failed
    #[error("datastore cipher call failed: {0}")]
    Datastore(#[from] rusqlite::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CryptoOp {
    Decrypt,
    Encrypt,
}

impl std::fmt::Display for CryptoOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CryptoOp::Decrypt => f.write_str("decryption"),
            CryptoOp::Encrypt => f.write_str("encryption"),
        }
    }
}

/// A single row's field could not be decrypted or re-encrypted.
///
/// Never propagated: it is recorded in the progress error log and the row is
/// left under the old key.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{operation} failed for column `{column}`: {reason}")]
pub struct RowCryptoError {
    pub column: &'static str,
    pub operation: CryptoOp,
    pub reason: String,
}

pub type Result<T> = std::result::Result<T, RotationError>;
