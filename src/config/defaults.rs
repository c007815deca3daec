// src/config/defaults.rs
use crate::config::app::{Audit, Datastore, Rotation};
use crate::consts::{DEFAULT_BATCH_SIZE, DEFAULT_KDF_ITERATIONS};

pub const DEFAULT_CONFIG_FILE: &str = "key-rotation.toml";
pub const DEFAULT_DATASTORE_PATH: &str = "data/app.db";
pub const DEFAULT_AUDIT_DIR: &str = "logs";

pub fn default_datastore() -> Datastore {
    Datastore {
        path: DEFAULT_DATASTORE_PATH.into(),
        key: None,
        require_key: false,
    }
}

pub fn default_rotation() -> Rotation {
    Rotation {
        default_batch_size: DEFAULT_BATCH_SIZE,
        kdf_iterations: DEFAULT_KDF_ITERATIONS,
    }
}

pub fn default_audit() -> Audit {
    Audit {
        log_dir: DEFAULT_AUDIT_DIR.into(),
    }
}

pub fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

pub fn default_kdf_iterations() -> u32 {
    DEFAULT_KDF_ITERATIONS
}
