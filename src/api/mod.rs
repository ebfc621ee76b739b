//! Backend endpoints consumed by the core.

use tracing::{debug, info};

use crate::error::{AirsenseError, Result};
use crate::transport::AuthenticatedTransport;

pub mod models;

pub use models::{DataEnvelope, Environment, Parameter, RegisterRequest, Room};

/// Whether a `POST /auth` status means the device was newly registered.
///
/// Only 201 counts; 200 means "already registered".
pub fn is_newly_registered(status: u16) -> bool {
    status == http::StatusCode::CREATED.as_u16()
}

/// Typed client for the Airsense backend
#[derive(Clone)]
pub struct ApiClient {
    transport: AuthenticatedTransport,
}

impl ApiClient {
    pub fn new(transport: AuthenticatedTransport) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &AuthenticatedTransport {
        &self.transport
    }

    /// `POST /auth` with the device push token, returning the HTTP status.
    ///
    /// `bearer` replaces the stored session for this call, which is how an
    /// identity token is presented before any session exists.
    pub async fn register(&self, push_token: &str, bearer: Option<&str>) -> Result<u16> {
        let request = RegisterRequest {
            push_token: push_token.to_string(),
        };
        let response = self.transport.post_json("auth", &request, bearer).await?;
        info!(status = response.status(), "Registration round trip completed");
        Ok(response.status())
    }

    /// `GET /env?skip=&count=`
    pub async fn environments(&self, skip: usize, count: usize) -> Result<Vec<Environment>> {
        self.list("env", skip, count).await
    }

    /// `GET /env/{id}/room?skip=&count=`
    pub async fn rooms(&self, environment_id: i64, skip: usize, count: usize) -> Result<Vec<Room>> {
        self.list(&format!("env/{}/room", environment_id), skip, count).await
    }

    async fn list<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        skip: usize,
        count: usize,
    ) -> Result<Vec<T>> {
        let envelope: DataEnvelope<T> = self
            .transport
            .get_json(path, &[("skip", skip.to_string()), ("count", count.to_string())])
            .await?;
        let items = envelope
            .data
            .ok_or_else(|| AirsenseError::empty_body(path))?;
        debug!(path = %path, skip, count, returned = items.len(), "Fetched page");
        Ok(items)
    }
}
