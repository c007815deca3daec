// src/keys.rs
//! Operator key validation, redacted key digests and rotation identity

use std::fmt;

use sha2::{Digest, Sha256};

use crate::aliases::RotationKey;
use crate::consts::{KEY_HASH_PREFIX_LEN, MIN_KEY_LENGTH};
use crate::error::{Result, RotationError};

/// The old/new key pair of one rotation
///
/// `Debug` shows only the truncated digests.
#[derive(Clone)]
pub struct RotationKeys {
    old: RotationKey,
    new: RotationKey,
    old_hash: String,
    new_hash: String,
}

impl RotationKeys {
    /// Validate both keys. Nothing here touches the datastore.
    pub fn new(old_key: String, new_key: String) -> Result<Self> {
        if old_key.is_empty() || new_key.is_empty() {
            return Err(RotationError::Configuration(
                "both --old-key and --new-key are required".into(),
            ));
        }
        for (flag, key) in [("--old-key", &old_key), ("--new-key", &new_key)] {
            let len = key.chars().count();
            if len < MIN_KEY_LENGTH {
                return Err(RotationError::Configuration(format!(
                    "{flag} must be at least {MIN_KEY_LENGTH} characters (got {len})"
                )));
            }
        }
        if old_key == new_key {
            return Err(RotationError::Configuration(
                "--new-key must differ from --old-key".into(),
            ));
        }

        let old_hash = key_hash(&old_key);
        let new_hash = key_hash(&new_key);
        Ok(Self {
            old: RotationKey::new(old_key),
            new: RotationKey::new(new_key),
            old_hash,
            new_hash,
        })
    }

    pub fn old_key(&self) -> &RotationKey {
        &self.old
    }

    pub fn new_key(&self) -> &RotationKey {
        &self.new
    }

    pub fn old_hash(&self) -> &str {
        &self.old_hash
    }

    pub fn new_hash(&self) -> &str {
        &self.new_hash
    }

    /// Stable identifier for this key pair: `rot-<16 hex>`
    pub fn derived_rotation_id(&self) -> String {
        let digest = Sha256::new()
            .chain_update(self.old_hash.as_bytes())
            .chain_update(b":")
            .chain_update(self.new_hash.as_bytes())
            .finalize();
        format!("rot-{}", &hex::encode(digest)[..KEY_HASH_PREFIX_LEN])
    }
}

impl fmt::Debug for RotationKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RotationKeys")
            .field("old_hash", &self.old_hash)
            .field("new_hash", &self.new_hash)
            .finish()
    }
}

/// First [`KEY_HASH_PREFIX_LEN`] hex chars of SHA-256(key), the only form
/// in which a key may be logged or persisted
pub fn key_hash(key: &str) -> String {
    let digest = Sha256::digest(key.as_bytes());
    hex::encode(digest)[..KEY_HASH_PREFIX_LEN].to_string()
}
