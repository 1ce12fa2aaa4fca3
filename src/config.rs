//! Configuration management with YAML support

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::watch::WatchOptions;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub watch: WatchConfig,

    #[serde(default)]
    pub history: HistoryConfig,
}

/// Messages store location
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_path")]
    pub path: String,
}

/// Change feed tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    #[serde(default = "default_batch_limit")]
    pub batch_limit: usize,

    #[serde(default)]
    pub include_reactions: bool,
}

/// History command defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "default_history_limit")]
    pub limit: usize,
}

// Default value functions
fn default_database_path() -> String {
    "~/Library/Messages/chat.db".to_string()
}

fn default_debounce_ms() -> u64 {
    250
}

fn default_batch_limit() -> usize {
    100
}

fn default_history_limit() -> usize {
    50
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            batch_limit: default_batch_limit(),
            include_reactions: false,
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            limit: default_history_limit(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    /// Searches in order:
    /// 1. Provided path
    /// 2. ./msgtrail.yaml (current directory)
    /// 3. ~/.config/msgtrail/msgtrail.yaml
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut search_paths = Vec::new();
        if let Some(path) = path {
            search_paths.push(shellexpand::tilde(path).to_string());
        }
        search_paths.push("msgtrail.yaml".to_string());
        search_paths.push(shellexpand::tilde("~/.config/msgtrail/msgtrail.yaml").to_string());

        for search_path in &search_paths {
            if Path::new(search_path).exists() {
                return Self::from_file(Path::new(search_path));
            }
        }

        // No config file found, use defaults
        Ok(Config::default())
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("invalid config {}", path.display()))?;
        Ok(config)
    }

    /// Get the database path, expanding ~ to home directory
    pub fn database_path(&self) -> PathBuf {
        let expanded = shellexpand::tilde(&self.database.path).to_string();
        PathBuf::from(expanded)
    }

    /// Tracker options from the `watch` section
    pub fn watch_options(&self) -> WatchOptions {
        WatchOptions {
            debounce: Duration::from_millis(self.watch.debounce_ms),
            batch_limit: self.watch.batch_limit.max(1),
            include_reactions: self.watch.include_reactions,
        }
    }
}
