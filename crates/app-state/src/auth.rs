//! Sign-in, registration and session restore
//!
//! These flows are the only places that create a session. Each one persists
//! the token before publishing it, so the in-memory session and the stored
//! credential never disagree.

use api_client::types::{RegisterRequest, RegisterResponse, RegisterValidationError};
use api_client::{ApiError, FinanceApi};
use std::sync::Arc;
use storage::{CredentialError, CredentialStore};
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::logout::{LogoutCoordinator, LogoutError};
use crate::session::{Session, SessionState};

/// Authentication flow errors
#[derive(Debug, Error)]
pub enum AuthFlowError {
    /// The server rejected the request or could not be reached
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The token could not be persisted; no session was published
    #[error("Could not save credential: {0}")]
    Storage(#[from] CredentialError),

    /// The registration form is incomplete or inconsistent
    #[error(transparent)]
    Validation(#[from] RegisterValidationError),
}

impl AuthFlowError {
    /// Whether the server rejected the supplied credentials
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, AuthFlowError::Api(e) if e.is_unauthorized())
    }
}

/// Result type for authentication flows
pub type Result<T> = std::result::Result<T, AuthFlowError>;

/// Drives sign-in, registration, restore and sign-out
#[derive(Clone)]
pub struct AuthFlow {
    api: FinanceApi,
    credentials: Arc<dyn CredentialStore>,
    session: SessionState,
    logout: LogoutCoordinator,
}

impl AuthFlow {
    /// Create the flow over shared components
    pub fn new(
        api: FinanceApi,
        credentials: Arc<dyn CredentialStore>,
        session: SessionState,
        logout: LogoutCoordinator,
    ) -> Self {
        Self { api, credentials, session, logout }
    }

    /// Exchange username and password for a token and start a session
    #[instrument(skip(self, password))]
    pub async fn sign_in(&self, username: &str, password: &str) -> Result<Session> {
        let pair = self.api.obtain_token(username, password).await?;
        let session = self.establish_session(Some(username), &pair.access).await?;
        info!(user = username, "Signed in");
        Ok(session)
    }

    /// Persist `token` and then publish it
    ///
    /// If the token cannot be persisted the session is left untouched.
    pub async fn establish_session(&self, user: Option<&str>, token: &str) -> Result<Session> {
        let _transition = self.logout.lock_transition().await;
        self.credentials.save(token).await.map_err(|e| {
            warn!(error = %e, "Sign-in aborted, credential not persisted");
            e
        })?;
        self.session.set_credentials(user, token);
        Ok(self.session.current())
    }

    /// Create an account; the caller signs in separately afterwards
    #[instrument(skip_all, fields(username = %request.username))]
    pub async fn register(&self, request: &RegisterRequest) -> Result<RegisterResponse> {
        request.validate()?;
        Ok(self.api.register(request).await?)
    }

    /// Resume the session persisted by a previous run
    ///
    /// Returns `None` if there is nothing to resume or the server rejected
    /// the stored token.
    #[instrument(skip(self))]
    pub async fn restore(&self) -> Option<Session> {
        let token = match self.credentials.read().await {
            Ok(Some(token)) => token,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "Credential store unreadable, starting signed out");
                return None;
            }
        };

        match self.api.profile().await {
            Ok(profile) => {
                if !self.publish_if_stored(Some(&profile.username), &token).await {
                    return None;
                }
                info!(user = %profile.username, "Session restored");
            }
            Err(e) if e.is_unauthorized() => {
                // No-op if the monitor already tore down on this 401
                if let Err(e) = self.logout.logout().await {
                    warn!(error = %e, "Stale credential could not be cleared");
                }
                info!("Stored credential rejected, starting signed out");
                return None;
            }
            Err(e) => {
                warn!(error = %e, "Identity lookup failed, restoring without it");
                if !self.publish_if_stored(None, &token).await {
                    return None;
                }
            }
        }

        Some(self.session.current())
    }

    /// Publish `token` only if it is still the stored credential
    ///
    /// A teardown that ran while `me/` was in flight has already cleared it.
    async fn publish_if_stored(&self, user: Option<&str>, token: &str) -> bool {
        let _transition = self.logout.lock_transition().await;
        match self.credentials.read().await {
            Ok(Some(stored)) if stored == token => {
                self.session.set_credentials(user, token);
                true
            }
            Ok(_) => {
                info!("Stored credential changed during restore, not publishing it");
                false
            }
            Err(e) => {
                warn!(error = %e, "Credential store unreadable, starting signed out");
                false
            }
        }
    }

    /// End the current session
    pub async fn sign_out(&self) -> std::result::Result<(), LogoutError> {
        info!("Signing out");
        self.logout.logout().await
    }

    /// The session this flow publishes to
    pub fn session(&self) -> &SessionState {
        &self.session
    }
}
