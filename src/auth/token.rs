use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::identity::Identity;

/// Application session credential derived from an identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Bearer token attached to backend requests
    pub token: String,
    /// Identity this session was exchanged for
    pub identity_id: String,
    /// When the exchange completed
    pub issued_at: DateTime<Utc>,
}

impl Session {
    pub fn new(token: impl Into<String>, identity_id: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            identity_id: identity_id.into(),
            issued_at: Utc::now(),
        }
    }

    /// Value for the `Authorization` header
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

/// Session lifecycle states
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SessionState {
    /// No identity, no session
    SignedOut,

    /// Exchanging an identity token for a session
    ExchangingToken {
        identity: Identity,
        /// Session of the previous identity, still served until the exchange settles
        previous: Option<Session>,
    },

    /// Exchange completed
    SignedIn { identity: Identity, session: Session },

    /// Exchange failed; no session is published
    ExchangeFailed { identity: Identity, reason: String },
}

impl SessionState {
    /// The session requests should carry in this state
    pub fn session(&self) -> Option<&Session> {
        match self {
            SessionState::SignedIn { session, .. } => Some(session),
            SessionState::ExchangingToken { previous, .. } => previous.as_ref(),
            _ => None,
        }
    }

    /// Identity this state refers to
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            SessionState::SignedOut => None,
            SessionState::ExchangingToken { identity, .. }
            | SessionState::SignedIn { identity, .. }
            | SessionState::ExchangeFailed { identity, .. } => Some(identity),
        }
    }

    pub fn is_exchanging(&self) -> bool {
        matches!(self, SessionState::ExchangingToken { .. })
    }

    /// Whether the exchange for `identity_id` has reached a final outcome
    pub fn is_settled_for(&self, identity_id: &str) -> bool {
        match self {
            SessionState::SignedIn { identity, .. }
            | SessionState::ExchangeFailed { identity, .. } => identity.id == identity_id,
            _ => false,
        }
    }

    /// Short name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::SignedOut => "signed_out",
            SessionState::ExchangingToken { .. } => "exchanging_token",
            SessionState::SignedIn { .. } => "signed_in",
            SessionState::ExchangeFailed { .. } => "exchange_failed",
        }
    }
}
