//! Configuration module for the dashboard
//!
//! This module handles loading and parsing configuration from TOML files,
//! with sensible defaults for all optional values.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{DashboardError, Result};

/// Default poll interval in milliseconds
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 5_000;

/// Default number of samples retained per series
pub const DEFAULT_HISTORY_WINDOW: usize = 100;

/// Main configuration structure for the dashboard
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Backend connection configuration
    pub backend: BackendConfig,

    /// Poll loop configuration
    pub poller: PollerConfig,

    /// Series history configuration
    pub history: HistoryConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl DashboardConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            DashboardError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        Self::parse_str(&contents)
    }

    /// Parse configuration from a TOML string
    pub fn parse_str(contents: &str) -> Result<Self> {
        toml::from_str(contents)
            .map_err(|e| DashboardError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.backend.validate()?;

        if self.poller.interval_ms == 0 {
            return Err(DashboardError::Config(
                "Poll interval cannot be 0".to_string(),
            ));
        }

        if self.poller.catalog_retry_ms == 0 {
            return Err(DashboardError::Config(
                "Catalog retry delay cannot be 0".to_string(),
            ));
        }

        if self.history.window == 0 {
            return Err(DashboardError::Config(
                "History window must hold at least one sample".to_string(),
            ));
        }

        Ok(())
    }
}

/// Backend connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL the `/api/...` paths are resolved against
    pub base_url: String,

    /// Per-request timeout in milliseconds
    pub request_timeout_ms: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:3000/dashboard".to_string(),
            request_timeout_ms: 4_000,
        }
    }
}

impl BackendConfig {
    /// Request timeout as a [`Duration`]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    fn validate(&self) -> Result<()> {
        let url = reqwest::Url::parse(&self.base_url).map_err(|e| {
            DashboardError::Config(format!("Invalid backend URL '{}': {}", self.base_url, e))
        })?;

        match url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(DashboardError::Config(format!(
                    "Unsupported backend URL scheme '{}'",
                    other
                )))
            }
        }

        if self.request_timeout_ms == 0 {
            return Err(DashboardError::Config(
                "Request timeout cannot be 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Poll loop settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollerConfig {
    /// Interval between value queries in milliseconds
    pub interval_ms: u64,

    /// Delay before retrying a failed catalog fetch, in milliseconds
    pub catalog_retry_ms: u64,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_POLL_INTERVAL_MS,
            catalog_retry_ms: 5_000,
        }
    }
}

impl PollerConfig {
    /// Poll interval as a [`Duration`], never shorter than 1 ms
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.max(1))
    }

    /// Catalog retry delay as a [`Duration`], never shorter than 1 ms
    pub fn catalog_retry(&self) -> Duration {
        Duration::from_millis(self.catalog_retry_ms.max(1))
    }
}

/// Series history settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Maximum number of samples retained per series
    pub window: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            window: DEFAULT_HISTORY_WINDOW,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (pretty, json)
    pub format: LogFormat,

    /// Log file path (None for stderr)
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            file: None,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable format
    #[default]
    Pretty,

    /// JSON format
    Json,
}
