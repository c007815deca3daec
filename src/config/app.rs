// src/config/app.rs
use std::path::Path;

use serde::Deserialize;
use tracing::warn;

use super::defaults::*;
use crate::error::{Result, RotationError};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_datastore")]
    pub datastore: Datastore,
    #[serde(default = "default_rotation")]
    pub rotation: Rotation,
    #[serde(default = "default_audit")]
    pub audit: Audit,
}

#[derive(Clone, Deserialize)]
pub struct Datastore {
    pub path: String,
    /// At-rest key for the datastore itself; prefer `PKR_DATASTORE_KEY`
    #[serde(default)]
    pub key: Option<String>,
    /// Refuse to open the datastore without an at-rest key
    #[serde(default)]
    pub require_key: bool,
}

// Keeps the datastore key out of `{:?}` output
impl std::fmt::Debug for Datastore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Datastore")
            .field("path", &self.path)
            .field("key", &self.key.as_ref().map(|_| "<redacted>"))
            .field("require_key", &self.require_key)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Rotation {
    #[serde(default = "default_batch_size")]
    pub default_batch_size: usize,
    #[serde(default = "default_kdf_iterations")]
    pub kdf_iterations: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Audit {
    pub log_dir: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            datastore: default_datastore(),
            rotation: default_rotation(),
            audit: default_audit(),
        }
    }
}

/// Load config from `PKR_CONFIG` (or `key-rotation.toml`), then apply env overrides
pub fn load() -> Result<Config> {
    let config_path =
        std::env::var("PKR_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
    load_from(Path::new(&config_path))
}

/// Load config from an explicit path; falls back to defaults if the file is missing
pub fn load_from(path: &Path) -> Result<Config> {
    let mut conf = if path.exists() {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RotationError::Configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        parse(&content)?
    } else {
        warn!(
            path = %path.display(),
            "config file not found, using built-in defaults"
        );
        Config::default()
    };

    apply_env_overrides(&mut conf);
    conf.validate()?;
    Ok(conf)
}

pub fn parse(content: &str) -> Result<Config> {
    toml::from_str(content).map_err(|e| RotationError::Configuration(format!("invalid TOML: {e}")))
}

fn apply_env_overrides(conf: &mut Config) {
    if let Ok(path) = std::env::var("PKR_DATABASE") {
        conf.datastore.path = path;
    }
    if let Ok(key) = std::env::var("PKR_DATASTORE_KEY") {
        conf.datastore.key = Some(key);
    }
    if let Ok(dir) = std::env::var("PKR_AUDIT_DIR") {
        conf.audit.log_dir = dir;
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.datastore.path.trim().is_empty() {
            return Err(RotationError::Configuration(
                "datastore.path must not be empty".into(),
            ));
        }
        if self.rotation.default_batch_size == 0 {
            return Err(RotationError::Configuration(
                "rotation.default_batch_size must be a positive integer".into(),
            ));
        }
        if self.rotation.kdf_iterations == 0 {
            return Err(RotationError::Configuration(
                "rotation.kdf_iterations must be at least 1".into(),
            ));
        }
        if self.datastore.require_key && self.datastore.key.is_none() {
            return Err(RotationError::Configuration(
                "datastore.require_key is set but no datastore key was supplied".into(),
            ));
        }
        Ok(())
    }
}
