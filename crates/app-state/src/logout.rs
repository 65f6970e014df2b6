//! Logout coordination
//!
//! Teardown clears the persisted credential, resets the in-memory session,
//! and notifies the UI through a registered hook. It runs both for explicit
//! sign-out and whenever the server answers 401.
//!
//! Overlapping teardowns are safe: clearing an absent credential and
//! resetting a reset session are no-ops. The hook fires at most once per
//! logical session (see [`SessionState::epoch`]).
//!
//! Teardown and session creation are serialized on one transition lock, so a
//! sign-in never lands between a teardown's store clear and its session reset.

use api_client::UnauthorizedHandler;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use storage::{CredentialError, CredentialStore};
use thiserror::Error;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{error, info, warn};

use crate::session::SessionState;

/// Default number of attempts to clear the credential store
pub const DEFAULT_CLEAR_ATTEMPTS: u32 = 3;

/// Default delay between clear attempts
pub const DEFAULT_CLEAR_RETRY_DELAY: Duration = Duration::from_millis(50);

/// Sentinel meaning the hook has not fired for any session yet
const NO_EPOCH: u64 = u64::MAX;

/// Callback invoked after teardown, typically to navigate to the login screen
pub type TeardownHook = Arc<dyn Fn() + Send + Sync>;

/// Logout errors
#[derive(Debug, Error)]
pub enum LogoutError {
    /// The persisted credential could not be removed
    ///
    /// The in-memory session was still reset and the hook still ran.
    #[error("Failed to clear stored credential after {attempts} attempts: {source}")]
    StorageUnavailable {
        /// Number of attempts made
        attempts: u32,
        /// Last storage error
        #[source]
        source: CredentialError,
    },
}

/// Runs session teardown
///
/// Clone is cheap; clones share the hook and the once-per-session bookkeeping.
#[derive(Clone)]
pub struct LogoutCoordinator {
    credentials: Arc<dyn CredentialStore>,
    session: SessionState,
    hook: Arc<RwLock<Option<TeardownHook>>>,
    hooked_epoch: Arc<AtomicU64>,
    transition: Arc<Mutex<()>>,
    clear_attempts: u32,
    clear_retry_delay: Duration,
}

impl LogoutCoordinator {
    /// Create a coordinator over the given store and session
    pub fn new(credentials: Arc<dyn CredentialStore>, session: SessionState) -> Self {
        Self {
            credentials,
            session,
            hook: Arc::new(RwLock::new(None)),
            hooked_epoch: Arc::new(AtomicU64::new(NO_EPOCH)),
            transition: Arc::new(Mutex::new(())),
            clear_attempts: DEFAULT_CLEAR_ATTEMPTS,
            clear_retry_delay: DEFAULT_CLEAR_RETRY_DELAY,
        }
    }

    /// Set how many times clearing the store is attempted, and the delay between tries
    pub fn with_clear_retries(mut self, attempts: u32, delay: Duration) -> Self {
        self.clear_attempts = attempts.max(1);
        self.clear_retry_delay = delay;
        self
    }

    /// Register the teardown hook, replacing any previous one
    pub fn set_teardown_hook<F>(&self, hook: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        *self.hook.write() = Some(Arc::new(hook));
    }

    /// Whether a teardown hook is registered
    pub fn has_teardown_hook(&self) -> bool {
        self.hook.read().is_some()
    }

    /// The session this coordinator tears down
    pub fn session(&self) -> &SessionState {
        &self.session
    }

    /// Tear down the current session
    ///
    /// Session reset and the hook happen even if the store cannot be
    /// cleared; that failure is returned afterwards.
    pub async fn logout(&self) -> Result<(), LogoutError> {
        let _transition = self.lock_transition().await;
        let cleared = self.clear_credentials().await;

        self.session.reset();
        self.run_hook();

        cleared
    }

    /// Hold off teardowns while a session is being written
    ///
    /// Must not be held across an API call: a 401 tears down through
    /// [`LogoutCoordinator::logout`], which takes the same lock.
    pub(crate) async fn lock_transition(&self) -> MutexGuard<'_, ()> {
        self.transition.lock().await
    }

    async fn clear_credentials(&self) -> Result<(), LogoutError> {
        let mut attempt = 1;
        loop {
            match self.credentials.clear().await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < self.clear_attempts => {
                    warn!(attempt, error = %e, "Failed to clear credential, retrying");
                    tokio::time::sleep(self.clear_retry_delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    error!(attempts = attempt, error = %e, "Stored credential could not be cleared");
                    return Err(LogoutError::StorageUnavailable { attempts: attempt, source: e });
                }
            }
        }
    }

    fn run_hook(&self) {
        let epoch = self.session.epoch();
        if self.hooked_epoch.swap(epoch, Ordering::SeqCst) == epoch {
            return;
        }

        // Lock is released before the hook runs
        let Some(hook) = self.hook.read().clone() else {
            return;
        };

        info!(epoch, "Running teardown hook");
        if catch_unwind(AssertUnwindSafe(|| hook())).is_err() {
            error!(epoch, "Teardown hook panicked");
        }
    }
}

#[async_trait]
impl UnauthorizedHandler for LogoutCoordinator {
    async fn on_unauthorized(&self) {
        if let Err(e) = self.logout().await {
            error!(error = %e, "Teardown after 401 left a stored credential behind");
        }
    }
}

impl std::fmt::Debug for LogoutCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogoutCoordinator")
            .field("session", &self.session)
            .field("has_hook", &self.has_teardown_hook())
            .field("clear_attempts", &self.clear_attempts)
            .finish()
    }
}
