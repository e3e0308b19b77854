//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/clawscope/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/clawscope/` (~/.config/clawscope/)
//! - State/Logs: `$XDG_STATE_HOME/clawscope/` (~/.local/state/clawscope/)
//!
//! The observed OpenClaw runtime (agent roster, run registry, session logs)
//! lives elsewhere, under [`OpenClawConfig::root`].

use crate::error::{Error, Result};
use serde::Deserialize;
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
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    /// Where the observed runtime keeps its files
    #[serde(default)]
    pub openclaw: OpenClawConfig,

    /// HTTP/WebSocket listener
    #[serde(default)]
    pub server: ServerConfig,

    /// File watcher tuning
    #[serde(default)]
    pub watcher: WatcherConfig,

    /// Broadcast hub tuning
    #[serde(default)]
    pub hub: HubConfig,

    /// Task history journal caps
    #[serde(default)]
    pub history: HistoryConfig,

    /// Status calculation windows
    #[serde(default)]
    pub status: StatusConfig,

    /// Performance statistics window
    #[serde(default)]
    pub performance: PerformanceConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Location of the observed OpenClaw installation
#[derive(Debug, Deserialize, Clone)]
pub struct OpenClawConfig {
    /// Root directory (default `~/.openclaw`)
    #[serde(default = "default_openclaw_root")]
    pub root: PathBuf,
}

impl Default for OpenClawConfig {
    fn default() -> Self {
        Self {
            root: default_openclaw_root(),
        }
    }
}

fn default_openclaw_root() -> PathBuf {
    home_dir().join(".openclaw")
}

/// Listener configuration for the server binary
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_addr")]
    pub addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: default_addr(),
        }
    }
}

fn default_addr() -> String {
    "127.0.0.1:8765".to_string()
}

/// File watcher configuration
#[derive(Debug, Deserialize, Clone)]
pub struct WatcherConfig {
    /// Quiet period between two refresh callbacks
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// How long the watcher thread waits for a refresh to finish on the loop
    #[serde(default = "default_handoff_timeout")]
    pub handoff_timeout_secs: u64,

    /// Bounded join wait at shutdown
    #[serde(default = "default_stop_timeout")]
    pub stop_timeout_secs: u64,

    /// File suffixes that trigger a refresh
    #[serde(default = "default_suffixes")]
    pub suffixes: Vec<String>,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            handoff_timeout_secs: default_handoff_timeout(),
            stop_timeout_secs: default_stop_timeout(),
            suffixes: default_suffixes(),
        }
    }
}

impl WatcherConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn handoff_timeout(&self) -> Duration {
        Duration::from_secs(self.handoff_timeout_secs)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs)
    }
}

fn default_debounce_ms() -> u64 {
    300
}

fn default_handoff_timeout() -> u64 {
    10
}

fn default_stop_timeout() -> u64 {
    2
}

fn default_suffixes() -> Vec<String> {
    vec![".json".to_string(), ".jsonl".to_string(), ".log".to_string()]
}

/// Broadcast hub configuration
#[derive(Debug, Deserialize, Clone)]
pub struct HubConfig {
    /// Seconds between heartbeat full-state pushes
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,

    /// Per-connection send bound in milliseconds
    #[serde(default = "default_send_timeout_ms")]
    pub send_timeout_ms: u64,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            heartbeat_secs: default_heartbeat_secs(),
            send_timeout_ms: default_send_timeout_ms(),
        }
    }
}

impl HubConfig {
    pub fn heartbeat(&self) -> Duration {
        Duration::from_secs(self.heartbeat_secs)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }
}

fn default_heartbeat_secs() -> u64 {
    8
}

fn default_send_timeout_ms() -> u64 {
    2000
}

/// Task history caps
#[derive(Debug, Deserialize, Clone)]
pub struct HistoryConfig {
    /// Maximum entries kept in the persisted journal
    #[serde(default = "default_journal_cap")]
    pub journal_cap: usize,

    /// Maximum tasks returned from a merge
    #[serde(default = "default_result_cap")]
    pub result_cap: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            journal_cap: default_journal_cap(),
            result_cap: default_result_cap(),
        }
    }
}

fn default_journal_cap() -> usize {
    200
}

fn default_result_cap() -> usize {
    100
}

/// Status calculation configuration
#[derive(Debug, Deserialize, Clone)]
pub struct StatusConfig {
    /// Trailing window in which an error marks an agent as down
    #[serde(default = "default_error_window")]
    pub error_window_minutes: i64,

    /// How many trailing messages are scanned for errors
    #[serde(default = "default_recent_message_limit")]
    pub recent_message_limit: usize,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            error_window_minutes: default_error_window(),
            recent_message_limit: default_recent_message_limit(),
        }
    }
}

impl StatusConfig {
    pub fn error_window(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.error_window_minutes)
    }
}

fn default_error_window() -> i64 {
    5
}

fn default_recent_message_limit() -> usize {
    50
}

/// Performance statistics configuration
#[derive(Debug, Deserialize, Clone)]
pub struct PerformanceConfig {
    /// Minutes of per-minute history in each snapshot
    #[serde(default = "default_range_minutes")]
    pub range_minutes: u32,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            range_minutes: default_range_minutes(),
        }
    }
}

fn default_range_minutes() -> u32 {
    20
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
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

        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make the pipeline spin or lose history
    pub fn validate(&self) -> Result<()> {
        if self.watcher.debounce_ms == 0 {
            return Err(Error::Config(
                "watcher.debounce_ms must be greater than zero".to_string(),
            ));
        }
        if self.hub.heartbeat_secs == 0 {
            return Err(Error::Config(
                "hub.heartbeat_secs must be greater than zero".to_string(),
            ));
        }
        if self.history.journal_cap < self.history.result_cap {
            return Err(Error::Config(
                "history.journal_cap must be at least history.result_cap".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/clawscope/config.toml` (~/.config/clawscope/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("clawscope").join("config.toml")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/clawscope/` (~/.local/state/clawscope/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("clawscope")
    }

    /// Returns the log file path
    ///
    /// `$XDG_STATE_HOME/clawscope/clawscope.log` (~/.local/state/clawscope/clawscope.log)
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("clawscope.log")
    }
}
