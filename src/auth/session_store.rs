use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::debug;

use crate::auth::identity::Identity;
use crate::auth::token::{Session, SessionState};
use crate::error::{AirsenseError, Result};

/// Holder of the current [`SessionState`].
///
/// The state is swapped as a whole through a watch channel, so readers always
/// observe a complete value. Clones share the same underlying state.
#[derive(Clone)]
pub struct SessionStore {
    state: Arc<watch::Sender<SessionState>>,
}

impl SessionStore {
    /// Create an empty (signed out) store
    pub fn new() -> Self {
        let (sender, _) = watch::channel(SessionState::SignedOut);
        Self {
            state: Arc::new(sender),
        }
    }

    /// Create a store that already holds a session, e.g. one restored by the host
    pub fn with_session(identity: Identity, session: Session) -> Self {
        let store = Self::new();
        store.replace(SessionState::SignedIn { identity, session });
        store
    }

    /// Snapshot of the current state
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// The session requests should carry right now
    pub fn current_session(&self) -> Option<Session> {
        self.state.borrow().session().cloned()
    }

    /// Subscribe to state changes
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Replace the state unconditionally
    pub(crate) fn replace(&self, state: SessionState) {
        debug!(state = state.name(), "Session state replaced");
        self.state.send_replace(state);
    }

    /// Apply `f` atomically with respect to every other writer; `f` returns
    /// whether it changed anything
    pub(crate) fn modify<F>(&self, f: F) -> bool
    where
        F: FnOnce(&mut SessionState) -> bool,
    {
        self.state.send_if_modified(f)
    }

    /// Wait until the exchange for `identity_id` settles, returning its session
    pub async fn wait_for_session(&self, identity_id: &str, limit: Duration) -> Result<Session> {
        let mut receiver = self.subscribe();
        let settled = tokio::time::timeout(limit, async {
            receiver
                .wait_for(|state| state.is_settled_for(identity_id))
                .await
                .map(|state| state.clone())
        })
        .await
        .map_err(|_| AirsenseError::Timeout {
            operation: format!("session exchange for {}", identity_id),
        })?
        .map_err(|_| AirsenseError::NotStarted)?;

        match settled {
            SessionState::SignedIn { session, .. } => Ok(session),
            SessionState::ExchangeFailed { reason, .. } => Err(AirsenseError::auth_exchange(reason)),
            other => Err(AirsenseError::auth_exchange(format!(
                "unexpected state {}",
                other.name()
            ))),
        }
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}
