//! Credential Store
//!
//! Durable persistence for the single access token that identifies the
//! signed-in user to the API. Absence of a token means "unauthenticated".
//!
//! Token values never appear in logs or error messages.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::kv::{KvError, KvStore};

/// Fixed key under which the access token is persisted
pub const ACCESS_TOKEN_KEY: &str = "access_token";

/// Credential store errors
#[derive(Debug, Error)]
pub enum CredentialError {
    /// The underlying storage could not be read or written
    #[error("Credential storage unavailable: {0}")]
    StorageUnavailable(#[from] KvError),
}

/// Result type for credential store operations
pub type Result<T> = std::result::Result<T, CredentialError>;

/// Persistence for a single bearer token
///
/// Implementations must treat a missing token as `Ok(None)` on read and
/// must make `clear` a no-op when nothing is stored. `save` and `clear`
/// only return once the change is durable.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Persist the token, replacing any previous one
    async fn save(&self, token: &str) -> Result<()>;

    /// Read the current token, if any
    async fn read(&self) -> Result<Option<String>>;

    /// Remove the token
    async fn clear(&self) -> Result<()>;
}

/// Credential store backed by the device key-value store
#[derive(Clone)]
pub struct KvCredentialStore {
    kv: Arc<KvStore>,
}

impl KvCredentialStore {
    /// Create a credential store on top of a shared key-value store
    pub fn new(kv: Arc<KvStore>) -> Self {
        Self { kv }
    }

    /// Create a credential store backed by a temporary in-memory database
    pub fn in_memory() -> Result<Self> {
        Ok(Self::new(Arc::new(KvStore::in_memory()?)))
    }
}

#[async_trait]
impl CredentialStore for KvCredentialStore {
    async fn save(&self, token: &str) -> Result<()> {
        self.kv.set(ACCESS_TOKEN_KEY, &token).map_err(|e| {
            warn!(error = %e, "Failed to write access token");
            e
        })?;
        self.kv.flush_async().await?;
        debug!("Access token persisted");
        Ok(())
    }

    async fn read(&self) -> Result<Option<String>> {
        Ok(self.kv.get::<String>(ACCESS_TOKEN_KEY)?)
    }

    async fn clear(&self) -> Result<()> {
        let existed = self.kv.remove(ACCESS_TOKEN_KEY).map_err(|e| {
            warn!(error = %e, "Failed to remove access token");
            e
        })?;
        self.kv.flush_async().await?;
        debug!(existed, "Access token cleared");
        Ok(())
    }
}
