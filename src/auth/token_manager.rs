use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::api::{is_newly_registered, ApiClient};
use crate::auth::identity::{Identity, IdentityEvent, IdentityProvider, PushTokenSource};
use crate::auth::session_store::SessionStore;
use crate::auth::token::{Session, SessionState};
use crate::error::{AirsenseError, Result};

/// Keeps exactly one authoritative session in sync with the identity provider.
///
/// Every state transition bumps a generation counter inside the store's
/// update, and exchange results are only committed if the generation they
/// started under is still current. A result that arrives after a sign-out or
/// after a newer identity is therefore dropped.
#[derive(Clone)]
pub struct SessionTokenManager {
    store: SessionStore,
    api: ApiClient,
    push_tokens: Arc<dyn PushTokenSource>,
    provider: Arc<RwLock<Option<Arc<dyn IdentityProvider>>>>,
    generation: Arc<AtomicU64>,
    /// Identity event listener task
    listener: Arc<Mutex<Option<JoinHandle<()>>>>,
    /// In-flight exchange task, tagged with its generation
    exchange: Arc<Mutex<Option<(u64, JoinHandle<()>)>>>,
}

impl SessionTokenManager {
    pub fn new(store: SessionStore, api: ApiClient, push_tokens: Arc<dyn PushTokenSource>) -> Self {
        Self {
            store,
            api,
            push_tokens,
            provider: Arc::new(RwLock::new(None)),
            generation: Arc::new(AtomicU64::new(0)),
            listener: Arc::new(Mutex::new(None)),
            exchange: Arc::new(Mutex::new(None)),
        }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn state(&self) -> SessionState {
        self.store.state()
    }

    /// Latest session, read without waiting on any pending exchange
    pub fn current_session(&self) -> Option<Session> {
        self.store.current_session()
    }

    pub async fn is_started(&self) -> bool {
        self.listener.lock().await.is_some()
    }

    /// Subscribe to identity changes from `provider`.
    ///
    /// Calling this again replaces the previous subscription. The provider's
    /// current identity is applied immediately.
    pub async fn start(&self, provider: Arc<dyn IdentityProvider>) {
        let mut listener = self.listener.lock().await;
        if let Some(previous) = listener.take() {
            debug!("Replacing existing identity subscription");
            previous.abort();
        }

        let mut events = provider.subscribe();
        *self.provider.write().await = Some(Arc::clone(&provider));

        let current = provider.current_identity().await;
        self.handle_event(IdentityEvent::from_current(current)).await;

        let manager = self.clone();
        let handle = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => manager.handle_event(event).await,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Identity events lagged, resyncing with provider");
                        let current = provider.current_identity().await;
                        manager.handle_event(IdentityEvent::from_current(current)).await;
                    }
                    Err(RecvError::Closed) => {
                        debug!("Identity event stream closed");
                        break;
                    }
                }
            }
        });
        *listener = Some(handle);
        info!("Session token manager started");
    }

    /// Unsubscribe from the provider. Safe to call when not started.
    pub async fn stop(&self) {
        let Some(listener) = self.listener.lock().await.take() else {
            return;
        };
        listener.abort();

        if let Some((_, task)) = self.exchange.lock().await.take() {
            task.abort();
        }
        // An aborted exchange must not leave waiters hanging
        self.store.modify(|state| match state {
            SessionState::ExchangingToken { identity, .. } => {
                let identity = identity.clone();
                self.generation.fetch_add(1, Ordering::SeqCst);
                *state = SessionState::ExchangeFailed {
                    identity,
                    reason: "session token manager stopped".to_string(),
                };
                true
            }
            _ => false,
        });
        *self.provider.write().await = None;
        info!("Session token manager stopped");
    }

    pub(crate) async fn handle_event(&self, event: IdentityEvent) {
        match event {
            IdentityEvent::SignedOut => self.clear_session().await,
            IdentityEvent::IdentityChanged(identity) => {
                if let Err(e) = self.begin_exchange(identity, false).await {
                    error!(error = %e, "Could not start session exchange");
                }
            }
        }
    }

    /// Drop the session immediately; no network round trip gates this
    pub async fn clear_session(&self) {
        let mut cleared_generation = 0;
        let changed = self.store.modify(|state| {
            cleared_generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            let changed = !matches!(state, SessionState::SignedOut);
            *state = SessionState::SignedOut;
            changed
        });
        if changed {
            info!("Identity signed out, session cleared");
        }

        let mut exchange = self.exchange.lock().await;
        if matches!(exchange.as_ref(), Some((generation, _)) if *generation < cleared_generation) {
            if let Some((_, task)) = exchange.take() {
                task.abort();
            }
        }
    }

    /// Make sure an exchange for `identity` has happened or is under way.
    ///
    /// Returns `false` when the identity already has a session or an exchange
    /// in flight, so no duplicate registration is issued.
    pub async fn exchange_for(&self, identity: Identity) -> Result<bool> {
        self.begin_exchange(identity, false).await
    }

    /// Re-run a failed exchange for the current identity
    pub async fn retry(&self) -> Result<bool> {
        match self.store.state() {
            SessionState::ExchangeFailed { identity, .. } => self.begin_exchange(identity, true).await,
            _ => Ok(false),
        }
    }

    async fn begin_exchange(&self, identity: Identity, only_if_failed: bool) -> Result<bool> {
        let provider = self
            .provider
            .read()
            .await
            .clone()
            .ok_or(AirsenseError::NotStarted)?;

        let mut generation = 0;
        let started = self.store.modify(|state| {
            let same_identity = state.identity().is_some_and(|current| current.id == identity.id);
            let proceed = match state {
                SessionState::ExchangeFailed { .. } if only_if_failed => same_identity,
                _ if only_if_failed => false,
                SessionState::ExchangingToken { .. } | SessionState::SignedIn { .. } => !same_identity,
                SessionState::SignedOut | SessionState::ExchangeFailed { .. } => true,
            };
            if !proceed {
                return false;
            }
            generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            let previous = state.session().cloned();
            *state = SessionState::ExchangingToken {
                identity: identity.clone(),
                previous,
            };
            true
        });

        if !started {
            debug!(identity = %identity.id, "Exchange already settled or in flight");
            return Ok(false);
        }

        let manager = self.clone();
        let task = tokio::spawn(async move {
            let outcome = manager.exchange(provider.as_ref(), &identity).await;
            manager.commit(generation, identity, outcome);
        });
        self.track_exchange(generation, task).await;
        Ok(true)
    }

    async fn track_exchange(&self, generation: u64, task: JoinHandle<()>) {
        let mut exchange = self.exchange.lock().await;
        match exchange.take() {
            Some((current, current_task)) if current > generation => {
                // A newer exchange was tracked first
                task.abort();
                *exchange = Some((current, current_task));
            }
            Some((_, superseded)) => {
                superseded.abort();
                *exchange = Some((generation, task));
            }
            None => *exchange = Some((generation, task)),
        }
    }

    /// Identity token → `POST /auth` → forced token refresh on a new registration
    async fn exchange(&self, provider: &dyn IdentityProvider, identity: &Identity) -> Result<Session> {
        info!(identity = %identity.id, "Starting session exchange");

        let identity_token = provider
            .fetch_token(identity, false)
            .await
            .map_err(|e| AirsenseError::auth_exchange(format!("identity token fetch failed: {}", e)))?;

        let push_token = self
            .push_tokens
            .push_token()
            .await
            .map_err(|e| AirsenseError::auth_exchange(format!("push token unavailable: {}", e)))?;

        let status = self
            .api
            .register(&push_token, Some(&identity_token))
            .await
            .map_err(|e| AirsenseError::auth_exchange(format!("registration failed: {}", e)))?;

        if !http::StatusCode::from_u16(status).is_ok_and(|code| code.is_success()) {
            return Err(AirsenseError::auth_exchange(format!(
                "registration returned HTTP {}",
                status
            )));
        }
        if !is_newly_registered(status) {
            // Already registered: the identity token is the session as is
            debug!(identity = %identity.id, status, "Device already registered");
            return Ok(Session::new(identity_token, identity.id.clone()));
        }

        let fresh_token = provider
            .fetch_token(identity, true)
            .await
            .map_err(|e| AirsenseError::auth_exchange(format!("forced token refresh failed: {}", e)))?;

        Ok(Session::new(fresh_token, identity.id.clone()))
    }

    /// Publish an exchange outcome unless a newer transition happened meanwhile
    fn commit(&self, generation: u64, identity: Identity, outcome: Result<Session>) -> bool {
        let identity_id = identity.id.clone();
        let next = match outcome {
            Ok(session) => SessionState::SignedIn { identity, session },
            Err(e) => {
                warn!(identity = %identity_id, error = %e, "Session exchange failed");
                SessionState::ExchangeFailed {
                    identity,
                    reason: e.to_string(),
                }
            }
        };
        let next_name = next.name();

        let applied = self.store.modify(|state| {
            if self.generation.load(Ordering::SeqCst) != generation {
                return false;
            }
            *state = next;
            true
        });

        if applied {
            info!(identity = %identity_id, state = next_name, "Session exchange settled");
        } else {
            debug!(identity = %identity_id, generation, "Discarding stale exchange result");
        }
        applied
    }

    /// Register a rotated device push token with the backend.
    ///
    /// Uses the current session. A 201 forces an identity-token refresh and
    /// republishes the session, as the exchange does. Returns whether the
    /// backend reported a new registration.
    pub async fn register_push_token(&self, push_token: &str) -> Result<bool> {
        let status = self.api.register(push_token, None).await.map_err(|e| {
            warn!(error = %e, "Push token registration failed");
            e
        })?;
        if !is_newly_registered(status) {
            debug!(status, "Push token already registered");
            return Ok(false);
        }

        let generation = self.generation.load(Ordering::SeqCst);
        // While an exchange is pending its own outcome publishes the session,
        // so the refresh is skipped here rather than racing it
        let SessionState::SignedIn { identity, .. } = self.store.state() else {
            return Ok(true);
        };
        let Some(provider) = self.provider.read().await.clone() else {
            return Ok(true);
        };

        let refreshed = provider
            .fetch_token(&identity, true)
            .await
            .map(|token| Session::new(token, identity.id.clone()))
            .map_err(|e| AirsenseError::auth_exchange(format!("forced token refresh failed: {}", e)))?;
        self.commit(generation, identity, Ok(refreshed));
        Ok(true)
    }
}
