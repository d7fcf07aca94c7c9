use std::path::PathBuf;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::review::lock::DEFAULT_LEASE_SECS;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewConfig {
    pub version: String,
    /// Falls back to `~/.boxreview/data/boxreview.db` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_path: Option<PathBuf>,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            database_path: None,
            queue: QueueConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl ReviewConfig {
    pub fn database_path(&self) -> Option<PathBuf> {
        self.database_path
            .clone()
            .or_else(crate::db::default_database_path)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    #[serde(default = "default_lease_seconds")]
    pub lease_seconds: u32,
    /// Pending pages fetched per round while scanning for a free page.
    #[serde(default = "default_scan_page_size")]
    pub scan_page_size: u32,
    /// Whether taking a page drops the reviewer's other locks.
    #[serde(default = "default_true")]
    pub release_prior_locks: bool,
}

impl QueueConfig {
    pub fn lease(&self) -> Duration {
        Duration::seconds(i64::from(self.lease_seconds))
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            lease_seconds: default_lease_seconds(),
            scan_page_size: default_scan_page_size(),
            release_prior_locks: true,
        }
    }
}

fn default_lease_seconds() -> u32 {
    DEFAULT_LEASE_SECS as u32
}

fn default_scan_page_size() -> u32 {
    100
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// An `EnvFilter` directive, e.g. `info` or `boxreview=debug`.
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}
