//! Configuration module for the command-line tool
//!
//! Supports loading configuration from a TOML file. Command-line flags
//! override file values.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use vdisk::Credential;

/// Default configuration file name
pub const DEFAULT_CONFIG_PATH: &str = "vdisk.toml";

/// Tool configuration
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Task wait settings
    #[serde(default)]
    pub monitor: MonitorConfig,

    /// HTTP settings
    #[serde(default)]
    pub transport: TransportConfig,

    /// Credential settings
    #[serde(default)]
    pub session: SessionConfig,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Log level filter (default: "vdisk=info,vdisk_cli=info")
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// Task wait configuration
#[derive(Debug, Deserialize, Clone)]
pub struct MonitorConfig {
    /// Wait budget per reconfiguration in seconds (default: 30)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// HTTP configuration
#[derive(Debug, Deserialize, Clone)]
pub struct TransportConfig {
    /// Skip certificate validation (default: false)
    #[serde(default)]
    pub insecure: bool,

    /// Per-request timeout in seconds (default: 60)
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

/// Credential configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    /// Token used directly when set
    #[serde(default)]
    pub token: Option<String>,

    /// Environment variable read when no token is set (default: VDISK_TOKEN)
    #[serde(default = "default_token_env")]
    pub token_env: String,

    /// Send the token as a bearer token instead of a session token
    #[serde(default)]
    pub bearer: bool,
}

fn default_log_level() -> String {
    "vdisk=info,vdisk_cli=info".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_token_env() -> String {
    "VDISK_TOKEN".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            insecure: false,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            token: None,
            token_env: default_token_env(),
            bearer: false,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// If the file doesn't exist, returns default configuration.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(path.display().to_string(), e.to_string()))?;

        toml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(path.display().to_string(), e.to_string()))
    }

    /// Task wait budget
    pub fn task_timeout(&self) -> Duration {
        Duration::from_secs(self.monitor.timeout_secs)
    }

    /// Per-request HTTP timeout
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.transport.request_timeout_secs)
    }
}

impl SessionConfig {
    /// Build the credential from the configured token or its environment variable
    pub fn credential(&self) -> Result<Credential, ConfigError> {
        let token = match &self.token {
            Some(token) => token.clone(),
            None => std::env::var(&self.token_env)
                .map_err(|_| ConfigError::MissingToken(self.token_env.clone()))?,
        };

        if token.trim().is_empty() {
            return Err(ConfigError::MissingToken(self.token_env.clone()));
        }

        Ok(if self.bearer {
            Credential::Bearer(token)
        } else {
            Credential::SessionToken(token)
        })
    }
}

/// Configuration errors
#[derive(Debug)]
pub enum ConfigError {
    ReadError(String, String),
    ParseError(String, String),
    MissingToken(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadError(path, err) => {
                write!(f, "Failed to read config file '{}': {}", path, err)
            }
            ConfigError::ParseError(path, err) => {
                write!(f, "Failed to parse config file '{}': {}", path, err)
            }
            ConfigError::MissingToken(var) => {
                write!(f, "No session token configured and ${} is not set", var)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
