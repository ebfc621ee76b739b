//! In-memory [`HttpClient`] for tests and offline hosts.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use super::{HttpClient, HttpMethod, SimpleHttpResponse};
use crate::error::{AirsenseError, Result};

/// A request seen by the mock client
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: Option<String>,
}

impl RecordedRequest {
    /// Value of a header, matched case-insensitively
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Debug, Clone)]
enum MockReply {
    Respond(SimpleHttpResponse),
    Fail(String),
}

#[derive(Default)]
struct MockRoute {
    /// One-shot replies, consumed in order before the sticky reply
    queued: VecDeque<MockReply>,
    sticky: Option<MockReply>,
    delay: Option<Duration>,
}

/// A mock HTTP client that returns predefined responses
#[derive(Clone, Default)]
pub struct MockHttpClient {
    /// Map of URLs to responses
    routes: Arc<Mutex<HashMap<String, MockRoute>>>,
    /// Record of requests made
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockHttpClient {
    /// Create a new mock client
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a response returned for every request to `url`
    pub fn mock_response(&self, url: impl Into<String>, status: u16, body: impl Into<String>) {
        let reply = MockReply::Respond(SimpleHttpResponse::new(status, body));
        lock(&self.routes).entry(url.into()).or_default().sticky = Some(reply);
    }

    /// Register a JSON response returned for every request to `url`
    pub fn mock_json<T: serde::Serialize>(
        &self,
        url: impl Into<String>,
        status: u16,
        data: &T,
    ) -> Result<()> {
        let body = serde_json::to_string(data)?;
        self.mock_response(url, status, body);
        Ok(())
    }

    /// Queue a response used once, ahead of any sticky response
    pub fn queue_response(&self, url: impl Into<String>, status: u16, body: impl Into<String>) {
        let reply = MockReply::Respond(SimpleHttpResponse::new(status, body));
        lock(&self.routes).entry(url.into()).or_default().queued.push_back(reply);
    }

    /// Make every request to `url` fail at the transport level
    pub fn mock_failure(&self, url: impl Into<String>, reason: impl Into<String>) {
        lock(&self.routes).entry(url.into()).or_default().sticky =
            Some(MockReply::Fail(reason.into()));
    }

    /// Delay every reply for `url`
    pub fn mock_delay(&self, url: impl Into<String>, delay: Duration) {
        lock(&self.routes).entry(url.into()).or_default().delay = Some(delay);
    }

    /// Get the list of recorded requests
    pub fn get_requests(&self) -> Vec<RecordedRequest> {
        lock(&self.requests).clone()
    }

    /// Number of requests made to `url`
    pub fn request_count(&self, url: &str) -> usize {
        lock(&self.requests).iter().filter(|r| r.url == url).count()
    }

    fn record_request(
        &self,
        method: HttpMethod,
        url: &str,
        headers: HashMap<String, String>,
        body: Option<String>,
    ) {
        lock(&self.requests).push(RecordedRequest {
            method,
            url: url.to_string(),
            headers,
            body,
        });
    }

    fn next_reply(&self, url: &str) -> (Option<Duration>, Option<MockReply>) {
        let mut routes = lock(&self.routes);
        match routes.get_mut(url) {
            Some(route) => {
                let reply = route.queued.pop_front().or_else(|| route.sticky.clone());
                (route.delay, reply)
            }
            None => (None, None),
        }
    }

    async fn reply_for(&self, url: &str) -> Result<SimpleHttpResponse> {
        let (delay, reply) = self.next_reply(url);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match reply {
            Some(MockReply::Respond(response)) => Ok(response),
            Some(MockReply::Fail(reason)) => Err(AirsenseError::transport(reason)),
            None => Err(AirsenseError::transport(format!(
                "No mock response configured for URL: {}",
                url
            ))),
        }
    }
}

#[async_trait::async_trait]
impl HttpClient for MockHttpClient {
    async fn get(&self, url: &str, headers: HashMap<String, String>) -> Result<SimpleHttpResponse> {
        self.record_request(HttpMethod::GET, url, headers, None);
        self.reply_for(url).await
    }

    async fn post(
        &self,
        url: &str,
        headers: HashMap<String, String>,
        body: String,
    ) -> Result<SimpleHttpResponse> {
        self.record_request(HttpMethod::POST, url, headers, Some(body));
        self.reply_for(url).await
    }
}
