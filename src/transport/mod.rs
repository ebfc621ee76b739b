use std::collections::HashMap;
use std::time::Duration;

use tracing::trace;

use crate::error::{AirsenseError, Result};

pub mod authenticated;
pub mod mock;

pub use authenticated::AuthenticatedTransport;

/// Request method, as recorded by [`mock::MockHttpClient`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    GET,
    POST,
}

/// Status and body of a completed request
#[derive(Debug, Clone)]
pub struct SimpleHttpResponse {
    status_code: u16,
    body: String,
}

impl SimpleHttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status_code: status,
            body: body.into(),
        }
    }

    pub fn status(&self) -> u16 {
        self.status_code
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// Decode the body; malformed JSON is a `Decode` error
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_str(&self.body)?)
    }

    pub fn is_success(&self) -> bool {
        http::StatusCode::from_u16(self.status_code).is_ok_and(|status| status.is_success())
    }
}

/// The wire seam under [`AuthenticatedTransport`]; swap in the mock for tests
#[async_trait::async_trait]
pub trait HttpClient: Send + Sync {
    async fn get(&self, url: &str, headers: HashMap<String, String>) -> Result<SimpleHttpResponse>;

    async fn post(
        &self,
        url: &str,
        headers: HashMap<String, String>,
        body: String,
    ) -> Result<SimpleHttpResponse>;
}

/// [`HttpClient`] backed by reqwest
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    pub fn new() -> Self {
        Self::with_client(reqwest::Client::new())
    }

    /// Create a client whose requests fail after `timeout`
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AirsenseError::config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self::with_client(client))
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn send(
        request: reqwest::RequestBuilder,
        headers: HashMap<String, String>,
    ) -> Result<SimpleHttpResponse> {
        let request = headers
            .into_iter()
            .fold(request, |request, (name, value)| request.header(name, value));

        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        trace!(status, bytes = body.len(), "HTTP response read");

        Ok(SimpleHttpResponse::new(status, body))
    }
}

impl Default for ReqwestHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn get(&self, url: &str, headers: HashMap<String, String>) -> Result<SimpleHttpResponse> {
        Self::send(self.client.get(url), headers).await
    }

    async fn post(
        &self,
        url: &str,
        headers: HashMap<String, String>,
        body: String,
    ) -> Result<SimpleHttpResponse> {
        Self::send(self.client.post(url).body(body), headers).await
    }
}
