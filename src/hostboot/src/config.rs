/// hostboot configuration
/// Loaded from hostboot.toml
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{HostBootError, Result};

/// Default provisioning API prefix
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8080/api/v1";

/// Config file name looked up in the working directory
pub const CONFIG_FILE_NAME: &str = "hostboot.toml";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HostBootConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    10
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Delay between two polls of the same chain
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Registration window, re-armed by the last host to finish bootstrap
    #[serde(default = "default_registration_timeout_secs")]
    pub registration_timeout_secs: u64,
    /// Hosts still bootstrapping after this long are failed
    #[serde(default = "default_bootstrap_timeout_secs")]
    pub bootstrap_timeout_secs: u64,
}

fn default_interval_secs() -> u64 {
    3
}

fn default_registration_timeout_secs() -> u64 {
    120
}

fn default_bootstrap_timeout_secs() -> u64 {
    600 // 10 minutes
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            registration_timeout_secs: default_registration_timeout_secs(),
            bootstrap_timeout_secs: default_bootstrap_timeout_secs(),
        }
    }
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn registration_timeout(&self) -> Duration {
        Duration::from_secs(self.registration_timeout_secs)
    }

    pub fn bootstrap_timeout(&self) -> Duration {
        Duration::from_secs(self.bootstrap_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    1000
}

fn default_max_backoff_ms() -> u64 {
    8000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

impl HostBootConfig {
    /// Load configuration from an explicit path, else `hostboot.toml` in the working
    /// directory, else defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_paths = match path {
            Some(p) => vec![p.to_path_buf()],
            None => vec![PathBuf::from(CONFIG_FILE_NAME)],
        };

        for path in config_paths {
            if path.exists() {
                let content = std::fs::read_to_string(&path).map_err(|e| {
                    HostBootError::Config(format!("Failed to read config file {:?}: {}", path, e))
                })?;
                let config = Self::from_toml(&content).map_err(|e| {
                    HostBootError::Config(format!("Failed to parse config file {:?}: {}", path, e))
                })?;
                tracing::info!("Loaded hostboot config from {:?}", path);
                return Ok(config);
            }
        }

        if let Some(p) = path {
            return Err(HostBootError::Config(format!(
                "Config file not found: {:?}",
                p
            )));
        }

        tracing::warn!("No {} found, using defaults", CONFIG_FILE_NAME);
        Ok(Self::default())
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: HostBootConfig =
            toml::from_str(content).map_err(|e| HostBootError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.api.base_url.trim().is_empty() {
            return Err(HostBootError::Config("api.base_url must not be empty".into()));
        }
        if self.polling.interval_secs == 0 {
            return Err(HostBootError::Config(
                "polling.interval_secs must be greater than zero".into(),
            ));
        }
        if self.polling.registration_timeout_secs == 0 || self.polling.bootstrap_timeout_secs == 0
        {
            return Err(HostBootError::Config(
                "polling timeouts must be greater than zero".into(),
            ));
        }
        if self.retry.initial_backoff_ms > self.retry.max_backoff_ms {
            return Err(HostBootError::Config(
                "retry.initial_backoff_ms exceeds retry.max_backoff_ms".into(),
            ));
        }
        Ok(())
    }
}
