//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::api::ApiConfig;
use crate::storage::{StorageConfig as EngineConfig, SyncMode};
use crate::websocket::HubConfig;

/// Prefix shared by every environment override
pub const ENV_PREFIX: &str = "TELEMETRY_HUB_";

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub broadcast: BroadcastConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Tokio worker threads; 0 means one per CPU
    #[serde(default)]
    pub worker_threads: usize,

    #[serde(default = "default_window_hours")]
    pub default_window_hours: f64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_window_hours() -> f64 {
    1.0
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            worker_threads: 0,
            default_window_hours: default_window_hours(),
        }
    }
}

impl ServerConfig {
    /// Worker count with the 0 sentinel resolved
    pub fn effective_worker_threads(&self) -> usize {
        if self.worker_threads > 0 {
            return self.worker_threads;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }
}

/// Storage engine configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    #[serde(default = "default_reader_connections")]
    pub reader_connections: usize,

    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_ms: u64,
}

fn default_data_dir() -> String {
    dirs::data_local_dir()
        .map(|p| p.join("telemetry-hub").to_string_lossy().to_string())
        .unwrap_or_else(|| "./telemetry_data".to_string())
}

fn default_reader_connections() -> usize {
    4
}

fn default_busy_timeout() -> u64 {
    5000
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            reader_connections: default_reader_connections(),
            busy_timeout_ms: default_busy_timeout(),
        }
    }
}

impl StorageConfig {
    /// Data directory with a leading `~/` expanded
    pub fn data_dir_path(&self) -> PathBuf {
        match self.data_dir.strip_prefix("~/") {
            Some(rest) => dirs::home_dir()
                .map(|home| home.join(rest))
                .unwrap_or_else(|| PathBuf::from(&self.data_dir)),
            None => PathBuf::from(&self.data_dir),
        }
    }
}

/// Live fanout configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BroadcastConfig {
    #[serde(default = "default_max_subscribers")]
    pub max_subscribers: usize,

    /// Frames buffered per subscriber before it is dropped
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_max_subscribers() -> usize {
    1000
}

fn default_queue_capacity() -> usize {
    256
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            max_subscribers: default_max_subscribers(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,
}

/// Output format of the fmt layer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(ConfigError::Invalid(format!(
                "log format must be 'pretty' or 'json', got '{}'",
                other
            ))),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Config::default();
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve the effective configuration
    ///
    /// An explicit path must exist. Otherwise the first existing default
    /// location wins, falling back to defaults plus environment. Returns the
    /// file that was used, if any.
    pub fn resolve(explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>), ConfigError> {
        if let Some(path) = explicit {
            return Ok((Self::load_with_env(path)?, Some(path.to_path_buf())));
        }

        for path in default_config_paths() {
            if path.exists() {
                return Ok((Self::load_with_env(&path)?, Some(path)));
            }
        }

        Ok((Self::from_env()?, None))
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(format!("{}{}", ENV_PREFIX, key)).ok())
    }

    /// Apply overrides from any key lookup; keys are given without prefix
    fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("PORT") {
            self.server.port = parse_override("PORT", &port)?;
        }
        if let Some(threads) = lookup("WORKER_THREADS") {
            self.server.worker_threads = parse_override("WORKER_THREADS", &threads)?;
        }

        if let Some(data_dir) = lookup("DATA_DIR") {
            self.storage.data_dir = data_dir;
        }

        if let Some(level) = lookup("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("LOG_FORMAT") {
            self.logging.format = format.parse()?;
        }

        Ok(())
    }

    /// Reject values no component can run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.host.trim().is_empty() {
            return Err(ConfigError::Invalid("server.host cannot be empty".into()));
        }
        if !self.server.default_window_hours.is_finite() || self.server.default_window_hours < 0.0
        {
            return Err(ConfigError::Invalid(
                "server.default_window_hours must be a non-negative number".into(),
            ));
        }
        if self.storage.data_dir.trim().is_empty() {
            return Err(ConfigError::Invalid("storage.data_dir cannot be empty".into()));
        }
        if self.storage.reader_connections == 0 {
            return Err(ConfigError::Invalid(
                "storage.reader_connections must be at least 1".into(),
            ));
        }
        if self.broadcast.max_subscribers == 0 {
            return Err(ConfigError::Invalid(
                "broadcast.max_subscribers must be at least 1".into(),
            ));
        }
        if self.broadcast.queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "broadcast.queue_capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Storage engine settings
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            data_dir: self.storage.data_dir_path(),
            reader_connections: self.storage.reader_connections,
            busy_timeout_ms: self.storage.busy_timeout_ms,
            sync_mode: SyncMode::Full,
        }
    }

    /// Connection hub settings
    pub fn hub_config(&self) -> HubConfig {
        HubConfig {
            max_subscribers: self.broadcast.max_subscribers,
            queue_capacity: self.broadcast.queue_capacity,
        }
    }

    /// HTTP layer settings
    pub fn api_config(&self) -> ApiConfig {
        ApiConfig {
            host: self.server.host.clone(),
            port: self.server.port,
            default_window_hours: self.server.default_window_hours,
        }
    }
}

/// Default config file locations, most specific first
pub fn default_config_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("telemetry-hub").join("config.toml"));
    }
    paths.push(PathBuf::from("/etc/telemetry-hub/config.toml"));
    paths.push(PathBuf::from("./config.toml"));
    paths
}

fn parse_override<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| {
        ConfigError::Invalid(format!("{}{} has invalid value '{}'", ENV_PREFIX, key, raw))
    })
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Telemetry Hub Configuration
#
# Environment variables override these settings:
# - TELEMETRY_HUB_HOST
# - TELEMETRY_HUB_PORT
# - TELEMETRY_HUB_WORKER_THREADS
# - TELEMETRY_HUB_DATA_DIR
# - TELEMETRY_HUB_LOG_LEVEL
# - TELEMETRY_HUB_LOG_FORMAT

[server]
# Address to bind
host = "0.0.0.0"

# Port to listen on
port = 5000

# Request worker threads (0 = one per CPU)
worker_threads = 0

# Lookback used by GET /api/telemetry when no hours parameter is given
default_window_hours = 1.0

[storage]
# Directory holding telemetry.db
data_dir = "~/.local/share/telemetry-hub"

# Read-only connections serving history queries
reader_connections = 4

# How long a connection waits on a locked database (ms)
busy_timeout_ms = 5000

[broadcast]
# Maximum concurrent WebSocket subscribers
max_subscribers = 1000

# Updates buffered per subscriber; a subscriber that falls this far behind is dropped
queue_capacity = 256

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}
