use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::auth::identity::{Identity, IdentityProvider};
use crate::auth::token::Session;
use crate::auth::token_manager::SessionTokenManager;
use crate::error::{AirsenseError, Result};

/// User-facing authentication operations.
///
/// The coordinator only drives the identity provider. The session exchange
/// itself belongs to [`SessionTokenManager`]; after a successful identity
/// operation the coordinator makes sure exactly one exchange runs for the new
/// identity and waits for its outcome.
#[derive(Clone)]
pub struct AuthCoordinator {
    provider: Arc<dyn IdentityProvider>,
    sessions: SessionTokenManager,
    exchange_timeout: Duration,
}

impl AuthCoordinator {
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        sessions: SessionTokenManager,
        exchange_timeout: Duration,
    ) -> Self {
        Self {
            provider,
            sessions,
            exchange_timeout,
        }
    }

    /// Sign in with email and password
    pub async fn sign_in(&self, email: &str, secret: &str) -> Result<Session> {
        let identity = self
            .provider
            .sign_in_with_password(email, secret)
            .await
            .map_err(|e| identity_failure("sign in", e))?;
        self.complete(identity).await
    }

    /// Create an account and sign in to it
    pub async fn sign_up(&self, email: &str, secret: &str) -> Result<Session> {
        let identity = self
            .provider
            .create_account_with_password(email, secret)
            .await
            .map_err(|e| identity_failure("sign up", e))?;
        self.complete(identity).await
    }

    /// Sign in with a credential issued by a federated provider
    pub async fn sign_in_with_federated_credential(&self, provider_token: &str) -> Result<Session> {
        let identity = self
            .provider
            .sign_in_with_federated_credential(provider_token)
            .await
            .map_err(|e| identity_failure("federated sign in", e))?;
        self.complete(identity).await
    }

    /// Sign out. The session is cleared even if the provider reports an error.
    pub async fn sign_out(&self) -> Result<()> {
        let outcome = self.provider.sign_out().await;
        self.sessions.clear_session().await;
        if let Err(e) = &outcome {
            warn!(error = %e, "Identity provider sign out failed");
        }
        outcome
    }

    async fn complete(&self, identity: Identity) -> Result<Session> {
        info!(identity = %identity.id, "Identity operation succeeded");
        self.sessions.exchange_for(identity.clone()).await?;
        self.sessions
            .store()
            .wait_for_session(&identity.id, self.exchange_timeout)
            .await
    }
}

fn identity_failure(operation: &str, err: AirsenseError) -> AirsenseError {
    warn!(operation, error = %err, "Identity operation failed");
    match err {
        AirsenseError::Identity { .. } => err,
        other => AirsenseError::identity(other.to_string()),
    }
}
