//! Configuration management for the Iris daemon.
//!
//! This module provides TOML-based configuration file loading and saving.
//! The default configuration path is `~/.config/iris/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("log_level must be one of: trace, debug, info, warn, error; got {0}")]
    InvalidLogLevel(String),

    #[error("reconnect_delay_ms must be between 1 and 600000, got {0}")]
    InvalidReconnectDelay(u64),

    #[error("logout_reinit_delay_ms must be between 1 and 600000, got {0}")]
    InvalidLogoutDelay(u64),

    #[error("country_prefix must be at most 4 digits, got {0:?}")]
    InvalidCountryPrefix(String),

    #[error("transport mode must be one of: loopback; got {0}")]
    InvalidTransportMode(String),
}

/// Valid log level values for tracing configuration.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Valid transport modes. Wire implementations register out of tree; the
/// built-in mode runs on the in-process transport.
const VALID_TRANSPORT_MODES: &[&str] = &["loopback"];

/// Upper bound for the reconnect delays, in milliseconds.
const MAX_DELAY_MS: u64 = 600_000;

/// Main configuration structure for the Iris daemon.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    /// General daemon configuration.
    pub daemon: DaemonConfig,

    /// Session lifecycle configuration.
    pub session: SessionConfig,

    /// Transport selection.
    pub transport: TransportConfig,
}

/// General daemon configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DaemonConfig {
    /// Directory for storing daemon data (credentials, pidfile, etc.).
    pub data_dir: PathBuf,

    /// Logging level (trace, debug, info, warn, error).
    pub log_level: String,
}

/// Session lifecycle configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    /// Delay before re-initializing after the link closes, in milliseconds.
    pub reconnect_delay_ms: u64,

    /// Delay before re-initializing after a logout, in milliseconds.
    pub logout_reinit_delay_ms: u64,

    /// Country prefix stripped from paired identities. Empty disables
    /// stripping.
    pub country_prefix: String,

    /// Override for the credential directory. Defaults to
    /// `<data_dir>/credentials` when unset.
    pub credentials_dir: Option<PathBuf>,
}

/// Transport selection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TransportConfig {
    /// Transport mode to run the session on.
    pub mode: String,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: "info".to_string(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            reconnect_delay_ms: 3000,
            logout_reinit_delay_ms: 1000,
            country_prefix: "55".to_string(),
            credentials_dir: None,
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            mode: "loopback".to_string(),
        }
    }
}

/// Returns the default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("iris")
        .join("config.toml")
}

/// Returns the default data directory path.
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("iris")
}

impl Config {
    /// Apply environment variable overrides to the configuration.
    ///
    /// Environment variables take precedence over config file values.
    /// Supported variables:
    /// - IRIS_LOG_LEVEL: Override log level (trace, debug, info, warn, error)
    /// - IRIS_DATA_DIR: Override the data directory
    /// - IRIS_TRANSPORT_MODE: Override the transport mode
    /// - IRIS_COUNTRY_PREFIX: Override the identity country prefix
    pub fn apply_env_overrides(&mut self) {
        if let Ok(level) = std::env::var("IRIS_LOG_LEVEL") {
            if !level.is_empty() {
                tracing::info!("Overriding log_level from environment: {}", level);
                self.daemon.log_level = level;
            }
        }

        if let Ok(dir) = std::env::var("IRIS_DATA_DIR") {
            if !dir.is_empty() {
                tracing::info!("Overriding data_dir from environment: {}", dir);
                self.daemon.data_dir = PathBuf::from(dir);
            }
        }

        if let Ok(mode) = std::env::var("IRIS_TRANSPORT_MODE") {
            if !mode.is_empty() {
                tracing::info!("Overriding transport mode from environment: {}", mode);
                self.transport.mode = mode;
            }
        }

        if let Ok(prefix) = std::env::var("IRIS_COUNTRY_PREFIX") {
            // An empty value is meaningful here: it disables stripping.
            tracing::info!("Overriding country_prefix from environment: {:?}", prefix);
            self.session.country_prefix = prefix;
        }
    }

    /// Validate the configuration values.
    ///
    /// Returns an error if any configuration value is outside the valid range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let level = self.daemon.log_level.to_lowercase();
        if !VALID_LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(self.daemon.log_level.clone()));
        }

        let delay = self.session.reconnect_delay_ms;
        if delay < 1 || delay > MAX_DELAY_MS {
            return Err(ConfigError::InvalidReconnectDelay(delay));
        }

        let delay = self.session.logout_reinit_delay_ms;
        if delay < 1 || delay > MAX_DELAY_MS {
            return Err(ConfigError::InvalidLogoutDelay(delay));
        }

        let prefix = &self.session.country_prefix;
        if prefix.len() > 4 || !prefix.chars().all(|c| c.is_ascii_digit()) {
            return Err(ConfigError::InvalidCountryPrefix(prefix.clone()));
        }

        if !VALID_TRANSPORT_MODES.contains(&self.transport.mode.as_str()) {
            return Err(ConfigError::InvalidTransportMode(self.transport.mode.clone()));
        }

        Ok(())
    }

    /// The directory holding platform credentials.
    pub fn credentials_dir(&self) -> PathBuf {
        self.session
            .credentials_dir
            .clone()
            .unwrap_or_else(|| self.daemon.data_dir.join("credentials"))
    }

    /// The reconnect delay as a [`Duration`].
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.session.reconnect_delay_ms)
    }

    /// The post-logout re-init delay as a [`Duration`].
    pub fn logout_reinit_delay(&self) -> Duration {
        Duration::from_millis(self.session.logout_reinit_delay_ms)
    }

    /// Load configuration from a file.
    ///
    /// If the file does not exist, returns the default configuration.
    /// If the file exists but is invalid TOML, returns an error with
    /// a helpful message.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Load configuration from the default path.
    ///
    /// The default path is `~/.config/iris/config.toml`.
    pub fn load_default() -> Result<Self> {
        Self::load(default_config_path())
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str)
            .map_err(|e| anyhow::anyhow!("Invalid TOML configuration: {}", format_toml_error(&e)))
    }

    /// Save configuration to a file.
    ///
    /// Creates parent directories if they don't exist.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let contents = self.to_toml()?;
        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::debug!("Configuration saved to {:?}", path);
        Ok(())
    }

    /// Serialize configuration to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")
    }
}

/// Format a TOML deserialization error for user-friendly display.
fn format_toml_error(error: &toml::de::Error) -> String {
    let mut msg = error.message().to_string();

    if let Some(span) = error.span() {
        msg.push_str(&format!(" (at position {}..{})", span.start, span.end));
    }

    msg
}
