//! Per-vault configuration, persisted as `config.toml` next to the logs

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const KEY_FILE_NAME: &str = "key.pem";
pub const PUBLIC_KEY_FILE_NAME: &str = "key.pub";
pub const METADATA_DIR_NAME: &str = "metadata";
pub const CONTENT_DIR_NAME: &str = "content";

pub const DEFAULT_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_BLOCK_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultConfig {
    /// Upper bound on any single operation, in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// File contents are split into blocks of at most this many bytes
    #[serde(default = "default_block_size")]
    pub block_size: usize,
    /// Buffer size of log and activity event channels
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
    /// Number of projected trees kept in memory
    #[serde(default = "default_tree_cache_capacity")]
    pub tree_cache_capacity: u64,
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_block_size() -> usize {
    DEFAULT_BLOCK_SIZE
}

fn default_event_capacity() -> usize {
    1024
}

fn default_tree_cache_capacity() -> u64 {
    64
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            block_size: default_block_size(),
            event_capacity: default_event_capacity(),
            tree_cache_capacity: default_tree_cache_capacity(),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("config i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl VaultConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.block_size == 0 {
            return Err(ConfigError::Invalid("block_size must be positive".into()));
        }
        if self.timeout_ms == 0 {
            return Err(ConfigError::Invalid("timeout_ms must be positive".into()));
        }
        Ok(())
    }

    /// Load `config.toml` from a vault directory, falling back to defaults
    ///  when the file is absent
    pub fn load(dir: &Path) -> Result<Self, ConfigError> {
        let path = dir.join(CONFIG_FILE_NAME);
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(&path)?;
        let config: VaultConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, dir: &Path) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(dir.join(CONFIG_FILE_NAME), contents)?;
        Ok(())
    }
}
