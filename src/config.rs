//! Application configuration
//!
//! Defaults suit a debug build talking to a local server from the Android
//! emulator. Each value can be overridden from the environment.

use api_client::http::{DEFAULT_BASE_URL, DEFAULT_TIMEOUT};
use api_client::ApiClientConfig;
use std::path::PathBuf;
use std::time::Duration;
use storage::KvConfig;

use crate::AppError;

/// Env var overriding the API base URL
pub const ENV_API_URL: &str = "FINANCE_API_URL";

/// Env var overriding the request timeout, in whole seconds
pub const ENV_API_TIMEOUT_SECS: &str = "FINANCE_API_TIMEOUT_SECS";

/// Env var overriding the data directory
pub const ENV_DATA_DIR: &str = "FINANCE_DATA_DIR";

/// Default directory for on-device data
pub const DEFAULT_DATA_DIR: &str = "finance_data";

/// File name of the key-value database inside the data directory
const KV_FILE_NAME: &str = "kv.db";

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// API base URL
    pub api_url: String,
    /// Upper bound on a single network call
    pub api_timeout: Duration,
    /// Directory holding the key-value database
    pub data_dir: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_BASE_URL.to_string(),
            api_timeout: DEFAULT_TIMEOUT,
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
        }
    }
}

impl AppConfig {
    /// Defaults with a different API location
    pub fn new(api_url: impl Into<String>) -> Self {
        Self { api_url: api_url.into(), ..Default::default() }
    }

    /// Set the request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.api_timeout = timeout;
        self
    }

    /// Set the data directory
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    /// Read overrides from the process environment
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read overrides through `lookup`; unset keys keep their defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup(ENV_API_URL).filter(|v| !v.trim().is_empty()) {
            config.api_url = url.trim().to_string();
        }

        if let Some(raw) = lookup(ENV_API_TIMEOUT_SECS) {
            let secs: u64 = raw.trim().parse().map_err(|_| {
                AppError::Config(format!("{} must be a whole number of seconds, got {:?}", ENV_API_TIMEOUT_SECS, raw))
            })?;
            if secs == 0 {
                return Err(AppError::Config(format!("{} must be greater than zero", ENV_API_TIMEOUT_SECS)));
            }
            config.api_timeout = Duration::from_secs(secs);
        }

        if let Some(dir) = lookup(ENV_DATA_DIR).filter(|v| !v.trim().is_empty()) {
            config.data_dir = PathBuf::from(dir);
        }

        Ok(config)
    }

    /// Client settings derived from this config
    pub fn api_client_config(&self) -> ApiClientConfig {
        ApiClientConfig::new(&self.api_url).with_timeout(self.api_timeout)
    }

    /// Key-value store settings derived from this config
    pub fn kv_config(&self) -> KvConfig {
        KvConfig::new(self.data_dir.join(KV_FILE_NAME).to_string_lossy())
    }
}
