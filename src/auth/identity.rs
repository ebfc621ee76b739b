use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::events::{EventStream, Subscriber};

/// The authenticated principal as reported by the identity provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Opaque provider-assigned identifier
    pub id: String,
    /// Human-readable label, usually the account email
    pub display_label: String,
}

impl Identity {
    pub fn new(id: impl Into<String>, display_label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_label: display_label.into(),
        }
    }
}

/// Identity change notifications emitted by an [`IdentityProvider`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IdentityEvent {
    /// A (possibly different) identity is now current
    IdentityChanged(Identity),
    /// No identity is current any more
    SignedOut,
}

impl IdentityEvent {
    /// Map the provider's "current identity or nothing" shape onto an event
    pub fn from_current(identity: Option<Identity>) -> Self {
        match identity {
            Some(identity) => IdentityEvent::IdentityChanged(identity),
            None => IdentityEvent::SignedOut,
        }
    }
}

/// Stream that provider implementations publish identity events into.
///
/// There is no replay; a new subscriber asks for `current_identity` instead.
pub fn identity_event_stream(capacity: usize) -> EventStream<IdentityEvent> {
    EventStream::new(capacity)
}

/// Boundary to the external identity provider.
///
/// Implementations publish an [`IdentityEvent`] on every identity change,
/// including changes caused by the operations below.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Subscribe to identity change events
    fn subscribe(&self) -> Subscriber<IdentityEvent>;

    /// The identity that is current right now, if any
    async fn current_identity(&self) -> Option<Identity>;

    async fn sign_in_with_password(&self, email: &str, secret: &str) -> Result<Identity>;

    async fn create_account_with_password(&self, email: &str, secret: &str) -> Result<Identity>;

    /// Exchange an external federated credential for a provider identity
    async fn sign_in_with_federated_credential(&self, provider_token: &str) -> Result<Identity>;

    async fn sign_out(&self) -> Result<()>;

    /// Fetch an identity token, bypassing the provider's cache when `force_refresh` is set
    async fn fetch_token(&self, identity: &Identity, force_refresh: bool) -> Result<String>;
}

/// Source of the device push token sent along with backend registration
#[async_trait]
pub trait PushTokenSource: Send + Sync {
    async fn push_token(&self) -> Result<String>;
}

/// A push token that never changes, for hosts without push messaging
#[derive(Debug, Clone)]
pub struct StaticPushToken(pub String);

#[async_trait]
impl PushTokenSource for StaticPushToken {
    async fn push_token(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}
