//! Application configuration management.
//!
//! Handles loading, saving, and accessing client configuration including
//! the server base URL, session token storage, realtime reconnection policy,
//! and logging preferences. Configuration is persisted as TOML on disk.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::constants;
use crate::error::{KnError, KnResult};

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server connection settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Realtime transport settings.
    #[serde(default)]
    pub realtime: RealtimeConfig,

    /// Session settings.
    #[serde(default)]
    pub session: SessionConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Base API URL (e.g., "https://api.kinnect.example").
    #[serde(default)]
    pub address: String,

    /// API request timeout in milliseconds.
    #[serde(default = "default_api_timeout")]
    pub api_timeout_ms: u64,
}

/// Realtime transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// Base delay between reconnection attempts, in seconds.
    #[serde(default = "default_reconnect_base")]
    pub reconnect_base_delay_secs: u64,

    /// Maximum delay cap for reconnection backoff, in seconds.
    #[serde(default = "default_reconnect_max")]
    pub reconnect_max_delay_secs: u64,

    /// Maximum number of reconnection attempts (0 = unlimited).
    #[serde(default)]
    pub reconnect_max_attempts: u32,
}

/// Session configuration.
///
/// The token stored here is the CLI's persistence mechanism; UI hosts
/// typically supply the token from their own secure storage instead.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Bearer token for the current session, if one is saved.
    #[serde(default)]
    pub token: Option<String>,

    /// The user id this token belongs to.
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for log files. If empty, uses default location.
    #[serde(default)]
    pub directory: String,

    /// Enable JSON structured logging output.
    #[serde(default)]
    pub json_output: bool,
}

// Default value functions for serde

fn default_api_timeout() -> u64 {
    constants::DEFAULT_API_TIMEOUT_MS
}

fn default_reconnect_base() -> u64 {
    constants::RECONNECT_BASE_DELAY_SECS
}

fn default_reconnect_max() -> u64 {
    constants::RECONNECT_MAX_DELAY_SECS
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            realtime: RealtimeConfig::default(),
            session: SessionConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: String::new(),
            api_timeout_ms: default_api_timeout(),
        }
    }
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            reconnect_base_delay_secs: default_reconnect_base(),
            reconnect_max_delay_secs: default_reconnect_max(),
            reconnect_max_attempts: 0,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: String::new(),
            json_output: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from the default config file path.
    pub fn load_default() -> KnResult<Self> {
        let path = Self::default_config_path()?;
        if path.exists() {
            Self::load_from_file(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from_file(path: &Path) -> KnResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to the default config file path.
    pub fn save_default(&self) -> KnResult<()> {
        let path = Self::default_config_path()?;
        self.save_to_file(&path)
    }

    /// Save configuration to a specific file path.
    pub fn save_to_file(&self, path: &Path) -> KnResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)
            .map_err(|e| KnError::Config(format!("failed to serialize config: {e}")))?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Get the platform data directory for Kinnect.
    pub fn data_dir() -> KnResult<PathBuf> {
        let base = dirs::data_dir()
            .ok_or_else(|| KnError::Config("could not resolve platform data directory".into()))?;
        Ok(base.join("kinnect"))
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> KnResult<PathBuf> {
        Ok(Self::data_dir()?.join("config.toml"))
    }

    /// Get the effective log directory, using the configured path or the default.
    pub fn effective_log_dir(&self) -> KnResult<PathBuf> {
        if self.logging.directory.is_empty() {
            Ok(Self::data_dir()?.join("logs"))
        } else {
            Ok(PathBuf::from(&self.logging.directory))
        }
    }

    /// Check whether the server connection is configured.
    pub fn is_server_configured(&self) -> bool {
        !self.server.address.is_empty()
    }

    /// Sanitize and normalize a server address.
    ///
    /// Ensures the address has a scheme and strips trailing slashes.
    pub fn sanitize_server_address(address: &str) -> String {
        let trimmed = address.trim().trim_matches('"').trim();
        if trimmed.is_empty() {
            return String::new();
        }

        let with_scheme = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            trimmed.to_string()
        } else if trimmed.starts_with("localhost") || trimmed.starts_with("127.") {
            format!("http://{trimmed}")
        } else {
            format!("https://{trimmed}")
        };

        with_scheme.trim_end_matches('/').to_string()
    }
}

/// Thread-safe configuration holder for shared access across services.
#[derive(Clone)]
pub struct ConfigHandle {
    inner: Arc<RwLock<AppConfig>>,
    /// Where `save` writes. `None` means the default config path.
    path: Option<PathBuf>,
}

impl ConfigHandle {
    /// Create a new configuration handle persisting to the default path.
    pub fn new(config: AppConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
            path: None,
        }
    }

    /// Create a handle that persists to an explicit file path.
    pub fn with_path(config: AppConfig, path: PathBuf) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
            path: Some(path),
        }
    }

    /// Read the configuration.
    pub async fn read(&self) -> tokio::sync::RwLockReadGuard<'_, AppConfig> {
        self.inner.read().await
    }

    /// Write/update the configuration.
    pub async fn write(&self) -> tokio::sync::RwLockWriteGuard<'_, AppConfig> {
        self.inner.write().await
    }

    /// Save the current configuration to disk.
    pub async fn save(&self) -> KnResult<()> {
        let config = self.inner.read().await;
        match &self.path {
            Some(path) => config.save_to_file(path),
            None => config.save_default(),
        }
    }
}
