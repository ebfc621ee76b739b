use std::sync::Arc;

use tracing::info;

// Export modules
pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod events;
pub mod pagination;
pub mod transport;

#[cfg(test)]
mod tests;

pub use api::{ApiClient, Environment, Parameter, Room};
pub use auth::{
    identity_event_stream, AuthCoordinator, Identity, IdentityEvent, IdentityProvider, PushTokenSource, Session,
    SessionState, SessionStore, SessionTokenManager, StaticPushToken,
};
pub use config::ClientConfig;
pub use error::{AirsenseError, ErrorCategory, Result};
pub use pagination::{
    CollectionState, EnvironmentPages, Page, PageSource, PaginatedCollectionLoader, RoomPages,
};
pub use transport::{AuthenticatedTransport, HttpClient, ReqwestHttpClient};

/// Composition root wiring the session lifecycle and the collection loaders
#[derive(Clone)]
pub struct AirsenseClient {
    config: ClientConfig,
    store: SessionStore,
    api: ApiClient,
    provider: Arc<dyn IdentityProvider>,
    sessions: SessionTokenManager,
    coordinator: AuthCoordinator,
}

impl AirsenseClient {
    /// Create a client on top of the given HTTP client
    pub fn new(
        config: ClientConfig,
        http: Arc<dyn HttpClient>,
        provider: Arc<dyn IdentityProvider>,
        push_tokens: Arc<dyn PushTokenSource>,
    ) -> Result<Self> {
        config.validate()?;

        let store = SessionStore::new();
        let transport = AuthenticatedTransport::new(http, store.clone(), config.base_url.clone());
        let api = ApiClient::new(transport);
        let sessions = SessionTokenManager::new(store.clone(), api.clone(), push_tokens);
        let coordinator = AuthCoordinator::new(
            Arc::clone(&provider),
            sessions.clone(),
            config.exchange_timeout(),
        );

        Ok(Self {
            config,
            store,
            api,
            provider,
            sessions,
            coordinator,
        })
    }

    /// Create a client that talks HTTP through reqwest
    pub fn from_config(
        config: ClientConfig,
        provider: Arc<dyn IdentityProvider>,
        push_tokens: Arc<dyn PushTokenSource>,
    ) -> Result<Self> {
        let http = ReqwestHttpClient::with_timeout(config.request_timeout())?;
        Self::new(config, Arc::new(http), provider, push_tokens)
    }

    /// Start following the identity provider
    pub async fn start(&self) {
        info!(base_url = %self.config.base_url, "Starting Airsense client");
        self.sessions.start(Arc::clone(&self.provider)).await;
    }

    pub async fn stop(&self) {
        self.sessions.stop().await;
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn session_store(&self) -> &SessionStore {
        &self.store
    }

    pub fn sessions(&self) -> &SessionTokenManager {
        &self.sessions
    }

    pub fn auth(&self) -> &AuthCoordinator {
        &self.coordinator
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    /// Loader for the user's environments; starts its first refresh immediately
    pub fn environments(&self) -> Result<Arc<PaginatedCollectionLoader<Environment>>> {
        let source: Arc<dyn PageSource<Environment>> =
            Arc::new(EnvironmentPages::new(self.api.clone()));
        PaginatedCollectionLoader::new(source, self.config.page_size)
    }

    /// Loader for the rooms of one environment; starts its first refresh immediately
    pub fn rooms(&self, environment_id: i64) -> Result<Arc<PaginatedCollectionLoader<Room>>> {
        let source: Arc<dyn PageSource<Room>> =
            Arc::new(RoomPages::new(self.api.clone(), environment_id));
        PaginatedCollectionLoader::new(source, self.config.page_size)
    }
}
