//! Finance App
//!
//! Composition root for the finance client. [`AppContext`] wires the
//! credential store, session, logout coordinator and API client together so
//! that every request carries the stored token and every 401 tears the
//! session down.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod logging;

pub use config::AppConfig;
pub use logging::init_tracing;

pub use api_client::{ApiClient, ApiError, FinanceApi};
pub use app_state::{AuthFlow, AuthFlowError, LogoutCoordinator, LogoutError, Session, SessionEvent, SessionState};
pub use storage::{CredentialStore, KvCredentialStore, KvStore};

use anyhow::Context;
use std::sync::Arc;
use storage::KvError;
use tracing::info;

/// Application-level errors
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Local storage could not be opened
    #[error("Storage error: {0}")]
    Storage(#[from] KvError),

    /// API client error
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Sign-in or registration failed
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthFlowError),

    /// Sign-out left state behind
    #[error("Logout error: {0}")]
    Logout(#[from] LogoutError),
}

/// Result type for application operations
pub type Result<T> = std::result::Result<T, AppError>;

/// Shared application services
#[derive(Clone)]
pub struct AppContext {
    config: AppConfig,
    credentials: Arc<dyn CredentialStore>,
    session: SessionState,
    logout: LogoutCoordinator,
    api: FinanceApi,
    auth: AuthFlow,
}

impl AppContext {
    /// Open on-device storage and wire up the services
    pub fn new(config: AppConfig) -> Result<Self> {
        let kv = Arc::new(KvStore::new(config.kv_config())?);
        Self::with_credentials(config, Arc::new(KvCredentialStore::new(kv)))
    }

    /// Wire up the services over an existing credential store
    pub fn with_credentials(config: AppConfig, credentials: Arc<dyn CredentialStore>) -> Result<Self> {
        let session = SessionState::new();
        let logout = LogoutCoordinator::new(Arc::clone(&credentials), session.clone());

        let client = ApiClient::new(config.api_client_config(), Arc::clone(&credentials))?
            .with_unauthorized_handler(Arc::new(logout.clone()));
        let api = FinanceApi::new(client);
        let auth = AuthFlow::new(api.clone(), Arc::clone(&credentials), session.clone(), logout.clone());

        info!(api_url = %config.api_url, "Application context ready");
        Ok(Self { config, credentials, session, logout, api, auth })
    }

    /// Build from environment configuration
    pub fn from_env() -> anyhow::Result<Self> {
        let config = AppConfig::from_env().context("Failed to read configuration")?;
        let data_dir = config.data_dir.display().to_string();
        Self::new(config).with_context(|| format!("Failed to open app data in {}", data_dir))
    }

    /// Register the UI callback run after every teardown
    pub fn set_teardown_hook<F>(&self, hook: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.logout.set_teardown_hook(hook);
    }

    /// Active configuration
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Persisted credential
    pub fn credentials(&self) -> &Arc<dyn CredentialStore> {
        &self.credentials
    }

    /// Observable session
    pub fn session(&self) -> &SessionState {
        &self.session
    }

    /// Teardown coordinator
    pub fn logout(&self) -> &LogoutCoordinator {
        &self.logout
    }

    /// Typed API access
    pub fn api(&self) -> &FinanceApi {
        &self.api
    }

    /// Sign-in, registration, restore and sign-out
    pub fn auth(&self) -> &AuthFlow {
        &self.auth
    }
}
