use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::{debug, info};

use crate::error::{AirsenseError, Result};
use crate::events::IDENTITY_EVENT_CAPACITY;

// Default configuration values
const DEFAULT_BASE_URL: &str = "https://airsense.yooud.org/api/";
const DEFAULT_PAGE_SIZE: usize = 20;
const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 30;
const DEFAULT_EXCHANGE_TIMEOUT_SECONDS: u64 = 30;

/// Client configuration for the Airsense core
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the backend API, with trailing slash
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Number of items requested per page
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// How long sign-in operations wait for the session exchange to settle
    #[serde(default = "default_exchange_timeout")]
    pub exchange_timeout_secs: u64,
    /// Capacity of the identity event channel
    #[serde(default = "default_identity_event_capacity")]
    pub identity_event_capacity: usize,
}

// Default functions
fn default_base_url() -> String {
    std::env::var("AIRSENSE_API_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string())
}

fn default_page_size() -> usize {
    std::env::var("AIRSENSE_PAGE_SIZE")
        .ok()
        .and_then(|val| val.parse().ok())
        .unwrap_or(DEFAULT_PAGE_SIZE)
}

fn default_request_timeout() -> u64 {
    std::env::var("AIRSENSE_REQUEST_TIMEOUT_SECS")
        .ok()
        .and_then(|val| val.parse().ok())
        .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECONDS)
}

fn default_exchange_timeout() -> u64 {
    std::env::var("AIRSENSE_EXCHANGE_TIMEOUT_SECS")
        .ok()
        .and_then(|val| val.parse().ok())
        .unwrap_or(DEFAULT_EXCHANGE_TIMEOUT_SECONDS)
}

fn default_identity_event_capacity() -> usize {
    std::env::var("AIRSENSE_IDENTITY_EVENT_CAPACITY")
        .ok()
        .and_then(|val| val.parse().ok())
        .unwrap_or(IDENTITY_EVENT_CAPACITY)
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            page_size: default_page_size(),
            request_timeout_secs: default_request_timeout(),
            exchange_timeout_secs: default_exchange_timeout(),
            identity_event_capacity: default_identity_event_capacity(),
        }
    }
}

impl ClientConfig {
    /// Create a configuration pointing at the given base URL
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Check the configuration for values the core cannot work with
    pub fn validate(&self) -> Result<()> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(AirsenseError::config(format!(
                "base_url must use http or https: {}",
                self.base_url
            )));
        }
        if self.page_size == 0 {
            return Err(AirsenseError::config("page_size must be greater than zero"));
        }
        if self.request_timeout_secs == 0 || self.exchange_timeout_secs == 0 {
            return Err(AirsenseError::config("timeouts must be greater than zero"));
        }
        if self.identity_event_capacity == 0 {
            return Err(AirsenseError::config(
                "identity_event_capacity must be greater than zero",
            ));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn exchange_timeout(&self) -> Duration {
        Duration::from_secs(self.exchange_timeout_secs)
    }

    /// Load configuration from a JSON file, falling back to defaults if it doesn't exist
    pub async fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No configuration at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let config_str = fs::read_to_string(path)
            .await
            .map_err(|e| AirsenseError::config(format!("failed to read {}: {}", path.display(), e)))?;
        let config: ClientConfig = serde_json::from_str(&config_str)
            .map_err(|e| AirsenseError::config(format!("failed to parse {}: {}", path.display(), e)))?;
        config.validate()?;
        info!("Loaded configuration from {}", path.display());

        Ok(config)
    }

    /// Save configuration to a JSON file
    pub async fn save(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| AirsenseError::config(e.to_string()))?;
        }

        let config_str = serde_json::to_string_pretty(self)?;
        fs::write(path, config_str)
            .await
            .map_err(|e| AirsenseError::config(e.to_string()))?;
        debug!("Saved configuration to {}", path.display());

        Ok(())
    }
}

/// Get the path to the configuration file
pub fn config_path() -> PathBuf {
    std::env::var("AIRSENSE_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("airsense.json"))
}
