//! Network seam of the API client.
//!
//! The client only needs authenticated GET requests returning a status and
//! a body. [`HttpTransport`] implements this with `reqwest`; tests plug in
//! scripted transports.

use crate::error::{VaultError, redact_url};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderValue};
use std::time::Duration;
use url::Url;

/// Raw response handed back to the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl TransportResponse {
    /// Creates a response from a status code and body bytes
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Creates a 200 response with a JSON body
    pub fn json(value: &serde_json::Value) -> Self {
        Self::new(200, value.to_string())
    }

    /// True for 2xx statuses
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Performs authenticated GET requests.
///
/// Implementations must not log the `authorization` value.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends `GET url` with the given `Authorization` header value.
    ///
    /// # Errors
    /// Returns `VaultError::Request` if the request cannot be sent or the
    /// body cannot be read. Non-2xx statuses are not errors at this layer.
    async fn get(&self, url: &Url, authorization: &str) -> crate::Result<TransportResponse>;
}

/// `reqwest`-backed transport with rustls.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Builds a transport with the given connect timeout.
    ///
    /// Request timeouts are enforced by the client, per request, on top of
    /// this transport.
    ///
    /// # Errors
    /// Returns error if the TLS backend cannot be initialized
    pub fn new(connect_timeout: Duration) -> crate::Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .user_agent(concat!("cmsvault/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| VaultError::request_failed("http client", "failed to build HTTP client", e))?;

        Ok(Self { client })
    }

    /// Wraps an existing `reqwest` client
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &Url, authorization: &str) -> crate::Result<TransportResponse> {
        let endpoint = redact_url(url.as_str());

        let mut auth_value = HeaderValue::from_str(authorization).map_err(|e| {
            VaultError::request_failed(&endpoint, "authorization header is not valid ASCII", e)
        })?;
        auth_value.set_sensitive(true);

        let response = self
            .client
            .get(url.clone())
            .header(AUTHORIZATION, auth_value)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| VaultError::request_failed(&endpoint, "request could not be sent", e.without_url()))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| VaultError::request_failed(&endpoint, "failed to read response body", e.without_url()))?;

        Ok(TransportResponse::new(status, body.to_vec()))
    }
}
