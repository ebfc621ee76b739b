use std::collections::HashMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use super::{HttpClient, SimpleHttpResponse};
use crate::auth::SessionStore;
use crate::error::{AirsenseError, Result};

/// HTTP transport that attaches the current session as a bearer credential.
///
/// The session is read from the [`SessionStore`] at request time; requests
/// issued while no session exists go out without `Authorization`.
#[derive(Clone)]
pub struct AuthenticatedTransport {
    client: Arc<dyn HttpClient>,
    sessions: SessionStore,
    base_url: String,
}

impl AuthenticatedTransport {
    pub fn new(client: Arc<dyn HttpClient>, sessions: SessionStore, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Self {
            client,
            sessions,
            base_url,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for a path relative to the base URL
    pub fn url(&self, path: &str, query: &[(&str, String)]) -> String {
        let mut url = format!("{}{}", self.base_url, path.trim_start_matches('/'));
        for (i, (key, value)) in query.iter().enumerate() {
            url.push(if i == 0 { '?' } else { '&' });
            url.push_str(key);
            url.push('=');
            url.push_str(value);
        }
        url
    }

    fn headers(&self, bearer_override: Option<&str>) -> HashMap<String, String> {
        let mut headers = HashMap::new();
        headers.insert("Accept".to_string(), "application/json".to_string());

        let bearer = match bearer_override {
            Some(token) => Some(format!("Bearer {}", token)),
            None => self.sessions.current_session().map(|session| session.bearer()),
        };
        if let Some(bearer) = bearer {
            headers.insert("Authorization".to_string(), bearer);
        }
        headers
    }

    /// Issue a GET request
    pub async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<SimpleHttpResponse> {
        let url = self.url(path, query);
        debug!(method = "GET", url = %url, "Sending request");

        let response = self.client.get(&url, self.headers(None)).await.map_err(|e| {
            warn!(url = %url, error = %e, "GET request failed");
            e
        })?;

        debug!(url = %url, status = response.status(), "Received response");
        Ok(response)
    }

    /// Issue a POST request with a JSON body.
    ///
    /// `bearer_override` replaces the stored session for this request only.
    pub async fn post_json<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
        bearer_override: Option<&str>,
    ) -> Result<SimpleHttpResponse> {
        let url = self.url(path, &[]);
        let body = serde_json::to_string(body)?;
        let mut headers = self.headers(bearer_override);
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        debug!(method = "POST", url = %url, "Sending request");

        let response = self.client.post(&url, headers, body).await.map_err(|e| {
            warn!(url = %url, error = %e, "POST request failed");
            e
        })?;

        debug!(url = %url, status = response.status(), "Received response");
        Ok(response)
    }

    /// GET a JSON document; non-2xx statuses and empty bodies are errors
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let response = self.get(path, query).await?;
        if !response.is_success() {
            warn!(path = %path, status = response.status(), "Unexpected status");
            return Err(AirsenseError::status(response.status(), path));
        }
        if response.body().trim().is_empty() {
            return Err(AirsenseError::empty_body(path));
        }
        response.json()
    }
}
