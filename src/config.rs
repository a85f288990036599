//! Process configuration.
//!
//! Read from a TOML file (every section optional), then overridden by
//! `GOTEL_*` environment variables.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::alerts::{PagerDutyConfig, SmtpConfig, WebhookConfig};
use crate::cluster::ClusterConfig;
use crate::monitor::MonitorConfig;

pub const DEFAULT_CONFIG_PATH: &str = "gotel.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub main: MainConfig,
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub cluster: ClusterConfig,
    pub monitor: MonitorConfig,
    pub smtp: SmtpConfig,
    pub pagerduty: PagerDutyConfig,
    pub webhook: WebhookConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MainConfig {
    /// Owner and notify address of the monitor's own heartbeat reservations
    pub owner_email: String,
    /// Cooldown between two alerts for the same reservation and channel
    pub hours_between_alerts: i64,
    /// Retention for housekeeping and alert history
    pub days_to_store_logs: i64,
}

impl Default for MainConfig {
    fn default() -> Self {
        Self {
            owner_email: String::new(),
            hours_between_alerts: 1,
            days_to_store_logs: 7,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    Sqlite,
}

impl std::str::FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(StoreBackend::Memory),
            "sqlite" => Ok(StoreBackend::Sqlite),
            other => Err(ConfigError::InvalidValue {
                key: "GOTEL_STORE_BACKEND",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Sqlite,
            path: PathBuf::from("gotel.db"),
        }
    }
}

impl Config {
    /// Parse a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::load_str(&content)
    }

    pub fn load_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Resolve the config file from `GOTEL_CONFIG_PATH`, then apply
    /// environment overrides. A missing default file is not an error.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = match std::env::var("GOTEL_CONFIG_PATH") {
            Ok(path) => Self::load(Path::new(&path))?,
            Err(_) => {
                let path = Path::new(DEFAULT_CONFIG_PATH);
                if path.exists() {
                    Self::load(path)?
                } else {
                    tracing::info!("No {} found, using defaults", DEFAULT_CONFIG_PATH);
                    Self::default()
                }
            }
        };
        config.apply_env()?;
        Ok(config)
    }

    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply `GOTEL_*` overrides from any key lookup
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("GOTEL_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("GOTEL_PORT") {
            self.server.port = port.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: "GOTEL_PORT",
                value: port,
            })?;
        }
        if let Some(path) = lookup("GOTEL_DB_PATH") {
            self.store.path = PathBuf::from(path);
        }
        if let Some(backend) = lookup("GOTEL_STORE_BACKEND") {
            self.store.backend = backend.parse()?;
        }
        if let Some(addr) = lookup("GOTEL_ADVERTISE_ADDR") {
            self.cluster.advertise_addr = Some(addr);
        }
        if let Some(email) = lookup("GOTEL_OWNER_EMAIL") {
            self.main.owner_email = email;
        }
        if let Some(host) = lookup("GOTEL_SMTP_HOST") {
            self.smtp.host = host;
        }
        if let Some(key) = lookup("GOTEL_PD_SERVICE_KEY") {
            self.pagerduty.service_key = key;
        }
        Ok(())
    }

    /// Retention window in seconds
    pub fn retention_secs(&self) -> i64 {
        self.main
            .days_to_store_logs
            .saturating_mul(crate::data::SECONDS_PER_DAY)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Unable to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}
