//! Configuration loading and API base URL resolution
//!
//! Bootstrap configuration comes from a small TOML file. Everything in it has
//! a built-in default, so a missing file is a warning rather than an error.
//!
//! # API Base URL Priority
//!
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (`TSIM_API_BASE_URL`)
//! 3. TOML config file
//! 4. Compiled default (fallback)

use crate::types::{BookId, RankBy};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Compiled default origin of the similarity API
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";

/// Environment variable overriding the API base URL
pub const API_BASE_URL_ENV: &str = "TSIM_API_BASE_URL";

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Origin of the similarity API (optional, see priority order above)
    #[serde(default)]
    pub api_base_url: Option<String>,

    /// Per-request timeout for similarity API calls
    ///
    /// Default: 10000 ms
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Minimum occurrence count a book needs for a row to be kept
    ///
    /// Default: 5
    #[serde(default = "default_min_count")]
    pub min_count: u64,

    /// Number of rows displayed after ranking
    ///
    /// Default: 25
    #[serde(default = "default_top_n")]
    pub top_n: usize,

    /// Initial ranking key
    #[serde(default)]
    pub rank_by: RankBy,

    /// Book selected after every term change (falls back to the first book)
    #[serde(default)]
    pub default_book_id: Option<BookId>,

    /// Event bus buffer size
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_min_count() -> u64 {
    5
}

fn default_top_n() -> usize {
    25
}

fn default_event_capacity() -> usize {
    100
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            api_base_url: None,
            request_timeout_ms: default_request_timeout_ms(),
            min_count: default_min_count(),
            top_n: default_top_n(),
            rank_by: RankBy::default(),
            default_book_id: None,
            event_capacity: default_event_capacity(),
            logging: LoggingConfig::default(),
        }
    }
}

impl TomlConfig {
    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: TomlConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    /// Load configuration, falling back to defaults when no file exists
    ///
    /// Uses `explicit` when given, otherwise the platform config path.
    /// A file that exists but fails to parse is still an error.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit.map(PathBuf::from).or_else(default_config_path) {
            Some(path) => path,
            None => {
                warn!("Could not determine config directory, using built-in defaults");
                return Ok(Self::default());
            }
        };

        if !path.exists() {
            warn!("Config file not found at {}, using built-in defaults", path.display());
            return Ok(Self::default());
        }

        let config = Self::load(&path)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Reject values the pipeline cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.request_timeout_ms == 0 {
            return Err(Error::Config("request_timeout_ms must be greater than 0".to_string()));
        }
        if self.top_n == 0 {
            return Err(Error::Config("top_n must be greater than 0".to_string()));
        }
        if self.event_capacity == 0 {
            return Err(Error::Config("event_capacity must be greater than 0".to_string()));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Default configuration file path for the platform
///
/// `<config dir>/tsim/config.toml`, e.g. `~/.config/tsim/config.toml` on Linux
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("tsim").join("config.toml"))
}

/// Resolve the similarity API origin following the priority order
pub fn resolve_api_base_url(
    cli_arg: Option<&str>,
    env_var_name: &str,
    config: &TomlConfig,
) -> String {
    // Priority 1: Command-line argument
    if let Some(url) = cli_arg.map(str::trim).filter(|u| !u.is_empty()) {
        return url.to_string();
    }

    // Priority 2: Environment variable
    if let Ok(url) = std::env::var(env_var_name) {
        let url = url.trim();
        if !url.is_empty() {
            return url.to_string();
        }
    }

    // Priority 3: TOML config file
    if let Some(url) = config.api_base_url.as_deref().map(str::trim).filter(|u| !u.is_empty()) {
        return url.to_string();
    }

    // Priority 4: Compiled default
    DEFAULT_API_BASE_URL.to_string()
}
