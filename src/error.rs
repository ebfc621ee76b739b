use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Broad error categories used to decide how a failure should be handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Network or HTTP layer failures
    Network,
    /// Identity provider or session exchange failures
    Authentication,
    /// The backend answered with something we cannot use
    Protocol,
    /// Invalid local configuration or misuse of the API
    Configuration,
}

/// Airsense error types using thiserror
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AirsenseError {
    /// Network/HTTP layer failure, including timeouts and unexpected statuses
    #[error("Transport failure: {reason}")]
    Transport {
        reason: String,
        status: Option<u16>,
    },

    /// Identity-token fetch or backend registration failed
    #[error("Session exchange failed: {reason}")]
    AuthExchange { reason: String },

    /// Success status but the expected payload was missing
    #[error("Empty response body from {endpoint}")]
    EmptyBody { endpoint: String },

    /// The identity provider rejected the operation
    #[error("Identity operation failed: {reason}")]
    Identity { reason: String },

    /// Body present but not in the expected shape
    #[error("Failed to decode response: {reason}")]
    Decode { reason: String },

    #[error("Invalid configuration: {reason}")]
    Config { reason: String },

    /// The session token manager has not been started
    #[error("Session token manager is not started")]
    NotStarted,

    #[error("Timed out waiting for {operation}")]
    Timeout { operation: String },
}

impl AirsenseError {
    /// Create a transport error without an HTTP status
    pub fn transport(reason: impl Into<String>) -> Self {
        AirsenseError::Transport {
            reason: reason.into(),
            status: None,
        }
    }

    /// Create a transport error for an unexpected HTTP status
    pub fn status(status: u16, endpoint: &str) -> Self {
        AirsenseError::Transport {
            reason: format!("{} returned HTTP {}", endpoint, status),
            status: Some(status),
        }
    }

    pub fn auth_exchange(reason: impl Into<String>) -> Self {
        AirsenseError::AuthExchange {
            reason: reason.into(),
        }
    }

    pub fn empty_body(endpoint: impl Into<String>) -> Self {
        AirsenseError::EmptyBody {
            endpoint: endpoint.into(),
        }
    }

    pub fn identity(reason: impl Into<String>) -> Self {
        AirsenseError::Identity {
            reason: reason.into(),
        }
    }

    pub fn config(reason: impl Into<String>) -> Self {
        AirsenseError::Config {
            reason: reason.into(),
        }
    }

    /// Category of this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            AirsenseError::Transport { .. } | AirsenseError::Timeout { .. } => {
                ErrorCategory::Network
            }
            AirsenseError::AuthExchange { .. } | AirsenseError::Identity { .. } => {
                ErrorCategory::Authentication
            }
            AirsenseError::EmptyBody { .. } | AirsenseError::Decode { .. } => {
                ErrorCategory::Protocol
            }
            AirsenseError::Config { .. } | AirsenseError::NotStarted => {
                ErrorCategory::Configuration
            }
        }
    }

    /// Whether retrying the enclosing user operation can reasonably succeed
    pub fn is_recoverable(&self) -> bool {
        !matches!(self.category(), ErrorCategory::Configuration)
    }
}

impl From<reqwest::Error> for AirsenseError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AirsenseError::Timeout {
                operation: format!("HTTP request ({})", err),
            }
        } else {
            AirsenseError::Transport {
                reason: err.to_string(),
                status: err.status().map(|s| s.as_u16()),
            }
        }
    }
}

impl From<serde_json::Error> for AirsenseError {
    fn from(err: serde_json::Error) -> Self {
        AirsenseError::Decode {
            reason: err.to_string(),
        }
    }
}

/// Result type for Airsense operations
pub type Result<T> = std::result::Result<T, AirsenseError>;
