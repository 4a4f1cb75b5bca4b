//! Store configuration.
//!
//! Every field has a default so a store can be opened with `{}` (or
//! [`StoreConfig::default`]) for local development.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};

/// LMDB's own default map size is 10 MiB; rows accumulate forever so start larger.
pub const DEFAULT_MAP_SIZE: usize = 64 * 1024 * 1024;

pub const DEFAULT_KEY_PREFIX: &str = "lifelink";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Database name. The LMDB environment lives in `<directory>/<name>.lmdb/`.
    pub name: String,

    /// Parent directory of the environment.
    pub directory: PathBuf,

    /// Maximum size of the memory map in bytes.
    pub map_size: usize,

    /// Namespace for every key written by the client, e.g. `lifelink_session`.
    pub key_prefix: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            name: "lifelink".to_string(),
            directory: PathBuf::from("."),
            map_size: DEFAULT_MAP_SIZE,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
        }
    }
}

impl StoreConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = directory.into();
        self
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// Parses a JSON object, filling absent fields with defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: StoreConfig = serde_json::from_str(json)
            .map_err(|e| StoreError::InvalidConfig(format!("Invalid config JSON: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(StoreError::InvalidConfig("name must not be empty".to_string()));
        }
        if self.map_size == 0 {
            return Err(StoreError::InvalidConfig("map_size must be greater than zero".to_string()));
        }
        if self.key_prefix.is_empty() {
            return Err(StoreError::InvalidConfig("key_prefix must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn db_path(&self) -> PathBuf {
        self.directory.join(format!("{}.lmdb", self.name))
    }
}
