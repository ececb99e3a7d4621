use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MIN_INTERVAL_MS: i64 = 1000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no hosts provided")]
    NoHosts,
    #[error("invalid port {0}, expected 1-65535")]
    InvalidPort(i64),
    #[error("invalid interval {0}ms, must be greater than 1000ms")]
    InvalidInterval(i64),
    #[error("could not find config directory")]
    NoConfigDir,
    #[error("settings file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("settings file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Validated, immutable parameters of a monitoring session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorConfig {
    pub hosts: Vec<String>,
    pub port: u16,
    pub interval: Duration,
}

impl MonitorConfig {
    /// `hosts` is whitespace separated. Repeated names are monitored once.
    pub fn validate(hosts: &str, port: i64, interval_ms: i64) -> Result<Self, ConfigError> {
        let mut names: Vec<String> = Vec::new();
        for name in hosts.split_whitespace() {
            if !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }
        if names.is_empty() {
            return Err(ConfigError::NoHosts);
        }

        let port = u16::try_from(port)
            .ok()
            .filter(|p| *p != 0)
            .ok_or(ConfigError::InvalidPort(port))?;

        if interval_ms <= MIN_INTERVAL_MS {
            return Err(ConfigError::InvalidInterval(interval_ms));
        }
        let interval = Duration::from_millis(interval_ms as u64);

        Ok(Self {
            hosts: names,
            port,
            interval,
        })
    }
}

/// Settings persisted between runs. Values are unvalidated until turned into
/// a [`MonitorConfig`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub hosts: String,
    pub port: i64,
    pub interval_ms: i64,
    pub listen: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            hosts: String::new(),
            port: 80,
            interval_ms: 5000,
            listen: "0.0.0.0:8080".to_string(),
        }
    }
}

impl Settings {
    pub fn get_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir()
            .ok_or(ConfigError::NoConfigDir)?
            .join("PortMonitor");
        Ok(config_dir.join("config.json"))
    }

    /// Reads the settings file, falling back to defaults when it does not exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(io_err)?;
        }
        let content = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, content).map_err(io_err)
    }

    pub fn monitor_config(&self) -> Result<MonitorConfig, ConfigError> {
        MonitorConfig::validate(&self.hosts, self.port, self.interval_ms)
    }
}
