//! Session state
//!
//! In-memory record of who is signed in. The persisted credential lives in
//! the [`storage::CredentialStore`]; this is the observable copy the UI
//! renders from. Callers persist the token first and publish it here second,
//! so no reader ever sees a token that storage does not have.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tracing::debug;

/// Capacity of the session event channel
const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Current authentication state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    /// Identity shown to the user, if known
    pub user: Option<String>,
    /// Bearer token for the session
    pub token: Option<String>,
}

impl Session {
    /// Whether a credential is held
    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }
}

/// Events broadcast when the session changes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A new session was published
    SignedIn {
        /// Identity, if known
        user: Option<String>,
    },
    /// The session was torn down
    SignedOut,
}

struct Inner {
    state_tx: watch::Sender<Session>,
    event_tx: broadcast::Sender<SessionEvent>,
    epoch: AtomicU64,
}

/// Shared, observable session
///
/// Clones share the same state. Mutations are visible to every clone and
/// every subscriber by the time the mutating call returns.
///
/// # Example
///
/// ```
/// use app_state::session::SessionState;
///
/// let session = SessionState::new();
/// let rx = session.subscribe();
///
/// session.set_credentials(Some("alice"), "tok-1");
/// assert_eq!(rx.borrow().user.as_deref(), Some("alice"));
///
/// session.reset();
/// assert!(!session.current().is_authenticated());
/// ```
#[derive(Clone)]
pub struct SessionState {
    inner: Arc<Inner>,
}

impl SessionState {
    /// Create an unauthenticated session
    pub fn new() -> Self {
        let (state_tx, _) = watch::channel(Session::default());
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { inner: Arc::new(Inner { state_tx, event_tx, epoch: AtomicU64::new(0) }) }
    }

    /// Publish a new session
    ///
    /// The token must already be persisted. Starts a new logical session,
    /// even if the same token is published twice.
    pub fn set_credentials(&self, user: Option<&str>, token: &str) {
        let session = Session { user: user.map(str::to_string), token: Some(token.to_string()) };
        // Epoch moves before the value so a reader of the new value sees the new epoch
        let epoch = self.inner.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.state_tx.send_replace(session);
        debug!(epoch, user = user.unwrap_or("<unknown>"), "Session published");

        let _ = self.inner.event_tx.send(SessionEvent::SignedIn { user: user.map(str::to_string) });
    }

    /// Return to the unauthenticated state
    ///
    /// Resetting an already-reset session changes nothing and notifies no one.
    pub fn reset(&self) {
        let changed = self.inner.state_tx.send_if_modified(|session| {
            if *session == Session::default() {
                false
            } else {
                *session = Session::default();
                true
            }
        });

        if changed {
            debug!(epoch = self.epoch(), "Session reset");
            let _ = self.inner.event_tx.send(SessionEvent::SignedOut);
        }
    }

    /// Snapshot of the current session
    pub fn current(&self) -> Session {
        self.inner.state_tx.borrow().clone()
    }

    /// Whether a credential is currently held
    pub fn is_authenticated(&self) -> bool {
        self.inner.state_tx.borrow().is_authenticated()
    }

    /// Watch the session value
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.inner.state_tx.subscribe()
    }

    /// Receive sign-in and sign-out events
    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.event_tx.subscribe()
    }

    /// Identifier of the current logical session
    ///
    /// Starts at 0 and increments on every [`SessionState::set_credentials`].
    pub fn epoch(&self) -> u64 {
        self.inner.epoch.load(Ordering::SeqCst)
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let session = self.current();
        f.debug_struct("SessionState")
            .field("user", &session.user)
            .field("authenticated", &session.is_authenticated())
            .field("epoch", &self.epoch())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_is_unauthenticated() {
        let session = SessionState::new();
        assert_eq!(session.current(), Session::default());
        assert!(!session.is_authenticated());
        assert_eq!(session.epoch(), 0);
    }

    #[test]
    fn test_set_credentials_sets_both_fields() {
        let session = SessionState::new();
        session.set_credentials(Some("alice"), "tok-1");

        let current = session.current();
        assert_eq!(current.user.as_deref(), Some("alice"));
        assert_eq!(current.token.as_deref(), Some("tok-1"));
        assert!(current.is_authenticated());
    }

    #[test]
    fn test_reset_clears_both_fields() {
        let session = SessionState::new();
        session.set_credentials(Some("alice"), "tok-1");
        session.reset();

        assert_eq!(session.current(), Session::default());
    }

    #[test]
    fn test_clones_share_state() {
        let session = SessionState::new();
        let other = session.clone();

        session.set_credentials(None, "tok");
        assert!(other.is_authenticated());
        assert_eq!(other.current().user, None);
    }

    #[test]
    fn test_epoch_increments_per_sign_in() {
        let session = SessionState::new();
        session.set_credentials(Some("alice"), "tok");
        session.reset();
        assert_eq!(session.epoch(), 1);

        session.set_credentials(Some("alice"), "tok");
        assert_eq!(session.epoch(), 2);
    }

    #[test]
    fn test_debug_output_hides_token() {
        let session = SessionState::new();
        session.set_credentials(Some("alice"), "secret-token");
        let output = format!("{:?}", session);
        assert!(output.contains("alice"));
        assert!(!output.contains("secret-token"));
    }

    #[tokio::test]
    async fn test_watch_subscribers_see_changes() {
        let session = SessionState::new();
        let mut rx = session.subscribe();

        session.set_credentials(Some("alice"), "tok-1");
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().token.as_deref(), Some("tok-1"));

        session.reset();
        rx.changed().await.unwrap();
        assert!(!rx.borrow_and_update().is_authenticated());
    }

    #[tokio::test]
    async fn test_events_and_idempotent_reset() {
        let session = SessionState::new();
        let mut events = session.subscribe_events();

        session.set_credentials(Some("alice"), "tok-1");
        session.reset();
        session.reset();

        assert_eq!(events.recv().await.unwrap(), SessionEvent::SignedIn { user: Some("alice".into()) });
        assert_eq!(events.recv().await.unwrap(), SessionEvent::SignedOut);
        assert!(matches!(events.try_recv(), Err(broadcast::error::TryRecvError::Empty)));
    }

    #[test]
    fn test_reset_without_session_does_not_notify_watchers() {
        let session = SessionState::new();
        let rx = session.subscribe();
        session.reset();
        assert!(!rx.has_changed().unwrap());
    }
}
