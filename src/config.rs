//! Configuration management for Conduit.
//!
//! Handles loading configuration from TOML files with serde defaults, plus
//! environment variable overrides for query bounds.

use crate::error::{ConduitError, Result};
use crate::gateway::{DEFAULT_MAX_ROWS, DEFAULT_TIMEOUT_MS};
use crate::history::DEFAULT_CAPACITY;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure for Conduit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Override for the state store location.
    pub state_path: Option<PathBuf>,

    /// Maximum number of retained history entries.
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,

    /// Default query execution bounds.
    #[serde(default)]
    pub query: QueryDefaults,
}

fn default_history_capacity() -> usize {
    DEFAULT_CAPACITY
}

impl Default for Config {
    fn default() -> Self {
        Self {
            state_path: None,
            history_capacity: default_history_capacity(),
            query: QueryDefaults::default(),
        }
    }
}

/// Default bounds applied to executions that do not override them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryDefaults {
    /// Advisory timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum returned row count.
    #[serde(default = "default_max_rows")]
    pub max_rows: usize,
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_max_rows() -> usize {
    DEFAULT_MAX_ROWS
}

impl Default for QueryDefaults {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            max_rows: default_max_rows(),
        }
    }
}

impl Config {
    /// Loads configuration from the given TOML file.
    ///
    /// A missing file yields the default configuration.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path).map_err(|e| {
            ConduitError::config(format!("Failed to read {}: {e}", path.display()))
        })?;

        let mut config: Config = toml::from_str(&contents).map_err(|e| {
            ConduitError::config(format!("Invalid config file {}: {e}", path.display()))
        })?;

        config.apply_env_overrides();
        Ok(config)
    }

    /// Returns the default config file path.
    ///
    /// - Linux/macOS: `~/.config/db-conduit/config.toml`
    /// - Windows: `%APPDATA%\db-conduit\config.toml`
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("db-conduit")
            .join("config.toml")
    }

    /// Applies environment variable overrides to query defaults.
    ///
    /// Recognized: `CONDUIT_TIMEOUT_MS`, `CONDUIT_MAX_ROWS`.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(value) = std::env::var("CONDUIT_TIMEOUT_MS") {
            if let Ok(timeout_ms) = value.parse() {
                self.query.timeout_ms = timeout_ms;
            }
        }
        if let Ok(value) = std::env::var("CONDUIT_MAX_ROWS") {
            if let Ok(max_rows) = value.parse() {
                self.query.max_rows = max_rows;
            }
        }
    }
}
