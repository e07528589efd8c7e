//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/evalscope/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/evalscope/` (~/.config/evalscope/)
//! - State/Logs: `$XDG_STATE_HOME/evalscope/` (~/.local/state/evalscope/)

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Serialize, Default, Clone)]
pub struct Config {
    /// Report pipeline and remote endpoint settings
    #[serde(default)]
    pub report: ReportConfig,

    /// Agent registry
    #[serde(default)]
    pub agents: AgentRegistry,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Settings for the batch report pipeline and its remote endpoints.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ReportConfig {
    /// Base URL the `api/evals/*` endpoints live under
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Optional bearer token sent with every request
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    /// Conversations per map-stage chunk
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Map-stage worker count (1 = strictly sequential)
    #[serde(default = "default_max_concurrent_chunks")]
    pub max_concurrent_chunks: usize,

    /// Upper bound for any single remote call, in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Max retry attempts for transient failures
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    /// Delay before a terminal state reverts to idle, in milliseconds
    #[serde(default = "default_reset_delay_ms")]
    pub reset_delay_ms: u64,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            chunk_size: default_chunk_size(),
            max_concurrent_chunks: default_max_concurrent_chunks(),
            request_timeout_secs: default_request_timeout(),
            max_retries: default_max_retries(),
            reset_delay_ms: default_reset_delay_ms(),
        }
    }
}

impl ReportConfig {
    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(Error::Config("report.base_url must not be empty".to_string()));
        }
        if self.chunk_size == 0 {
            return Err(Error::Config(
                "report.chunk_size must be at least 1".to_string(),
            ));
        }
        if self.max_concurrent_chunks == 0 {
            return Err(Error::Config(
                "report.max_concurrent_chunks must be at least 1".to_string(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(Error::Config(
                "report.request_timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Per-call timeout as a [`Duration`].
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Delay before success/error revert to idle.
    pub fn reset_delay(&self) -> Duration {
        Duration::from_millis(self.reset_delay_ms)
    }
}

fn default_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_chunk_size() -> usize {
    1000
}

fn default_max_concurrent_chunks() -> usize {
    1
}

fn default_request_timeout() -> u64 {
    90
}

fn default_max_retries() -> usize {
    2
}

fn default_reset_delay_ms() -> u64 {
    3000
}

/// Known agents and the one whose sessions feed the mode/context/prompt views.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AgentRegistry {
    /// Agent id whose conversations drive the mode, context-type and prompt views
    #[serde(default = "default_advisor_id")]
    pub advisor_id: String,

    /// Display names keyed by agent id. Only these agents get a row in the
    /// agent view.
    #[serde(default = "default_agent_names")]
    pub names: BTreeMap<String, String>,
}

impl Default for AgentRegistry {
    fn default() -> Self {
        Self {
            advisor_id: default_advisor_id(),
            names: default_agent_names(),
        }
    }
}

impl AgentRegistry {
    /// Display name for an agent id, falling back to the id itself.
    pub fn display_name<'a>(&'a self, agent_id: &'a str) -> &'a str {
        self.names
            .get(agent_id)
            .map(String::as_str)
            .unwrap_or(agent_id)
    }
}

fn default_advisor_id() -> String {
    "zvpmic1VqdKVwX1H0W3T".to_string()
}

fn default_agent_names() -> BTreeMap<String, String> {
    BTreeMap::from([(default_advisor_id(), "Blue".to_string())])
}

/// Logging configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        config.report.validate()?;
        Ok(config)
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/evalscope/config.toml` (~/.config/evalscope/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("evalscope").join("config.toml")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/evalscope/` (~/.local/state/evalscope/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("evalscope")
    }

    /// Returns the log file path
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("evalscope.log")
    }
}
