//! Configuration module
//!
//! `AppConfig` is read from a TOML file (default
//! `~/.config/ocpp-remote-auth/config.toml`). Every section is optional.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{DefaultAuthorizationPolicy, IdTagStatus};

const APP_DIR: &str = "ocpp-remote-auth";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Default configuration file location
pub fn default_config_path() -> PathBuf {
    dirs_next::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join("config.toml")
}

/// Default restore-state file location
pub fn default_restore_path() -> PathBuf {
    dirs_next::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join("restore_state.json")
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub api: ApiConfig,
    pub logging: LoggingConfig,
    pub metrics: MetricsConfig,
    pub restore: RestoreConfig,
    pub authorization: AuthorizationConfig,
    pub charge_points: Vec<ChargePointConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub ws_host: String,
    pub ws_port: u16,
    /// Heartbeat interval handed out in BootNotification responses (seconds)
    pub heartbeat_interval: u32,
    /// Upper bound for graceful shutdown (seconds)
    pub shutdown_timeout: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            ws_host: "0.0.0.0".to_string(),
            ws_port: 9000,
            heartbeat_interval: 300,
            shutdown_timeout: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive; `RUST_LOG` takes precedence
    pub level: String,
    /// `text` or `json`
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Install the Prometheus recorder and serve `/metrics` on the API
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RestoreConfig {
    /// Persist display values across restarts; in-memory only when off
    pub enabled: bool,
    pub path: Option<PathBuf>,
}

impl Default for RestoreConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: None,
        }
    }
}

impl RestoreConfig {
    pub fn resolved_path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(default_restore_path)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthorizationConfig {
    /// Status for tags nobody knows; `Accepted` is downgraded to `Invalid`
    pub unknown_status: IdTagStatus,
    pub id_tags: Vec<IdTagEntry>,
}

impl AuthorizationConfig {
    pub fn policy(&self) -> DefaultAuthorizationPolicy {
        self.id_tags.iter().fold(
            DefaultAuthorizationPolicy::new(self.unknown_status),
            |policy, entry| policy.with_id_tag(entry.id_tag.clone(), entry.status),
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdTagEntry {
    pub id_tag: String,
    pub status: IdTagStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargePointConfig {
    pub id: String,
    /// Fixed remote tag; omitted means restore or generate
    #[serde(default)]
    pub remote_id_tag: Option<String>,
}

impl AppConfig {
    /// Load from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for cp in &self.charge_points {
            let id = cp.id.trim();
            if id.is_empty() {
                return Err(ConfigError::Invalid("charge point id must not be empty".into()));
            }
            if id.contains('/') {
                return Err(ConfigError::Invalid(format!(
                    "charge point id '{}' must not contain '/'",
                    id
                )));
            }
            if !seen.insert(id) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate charge point id '{}'",
                    id
                )));
            }
        }

        if !matches!(self.logging.format.to_lowercase().as_str(), "text" | "json") {
            return Err(ConfigError::Invalid(format!(
                "unknown logging format '{}' (expected text or json)",
                self.logging.format
            )));
        }
        Ok(())
    }
}

/// WebSocket server configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// Heartbeat interval in seconds
    pub heartbeat_interval: u32,
}

impl Config {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            heartbeat_interval: 300,
        }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for Config {
    fn from(app: &AppConfig) -> Self {
        Self {
            host: app.server.ws_host.clone(),
            port: app.server.ws_port,
            heartbeat_interval: app.server.heartbeat_interval,
        }
    }
}
