//! HTTP transport seam
//!
//! The orchestrator only sees the `Transport` trait, so tests can script
//! upstream behaviour without a network. `HttpTransport` is the reqwest
//! implementation used in production.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::defaults::{MAX_BODY_BYTES, MAX_REDIRECTS};
use crate::config::{EndpointConfig, HttpConfig, HttpMethod};

/// Transport errors
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Session page returned status {0}")]
    Session(u16),

    #[error("Response body exceeds {limit} bytes")]
    BodyTooLarge { limit: usize },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Request cancelled")]
    Cancelled,
}

impl TransportError {
    /// Misconfigured requests fail the same way every time.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, TransportError::InvalidRequest(_) | TransportError::Cancelled)
    }
}

/// A fully resolved request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    /// Fetched first, with cookies kept for `url`
    pub session_url: Option<String>,
}

impl HttpRequest {
    pub fn get(url: &str) -> Self {
        Self {
            method: HttpMethod::Get,
            url: url.to_string(),
            headers: BTreeMap::new(),
            session_url: None,
        }
    }

    /// Resolve an endpoint for a cycle starting at `now_unix`.
    pub fn from_endpoint(endpoint: &EndpointConfig, now_unix: i64) -> Self {
        Self {
            method: endpoint.method,
            url: endpoint.resolve_url(now_unix),
            headers: endpoint.headers.clone(),
            session_url: endpoint.session_url.clone(),
        }
    }
}

/// Status and decoded body of a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends one request. Implementations must return promptly once `cancel`
/// fires.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        request: &HttpRequest,
        cancel: &CancellationToken,
    ) -> Result<HttpResponse, TransportError>;
}

// ============================================================================
// reqwest implementation
// ============================================================================

/// reqwest-backed transport with a shared cookie jar.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(config: &HttpConfig) -> Result<Self, TransportError> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(config.user_agent.clone())
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .cookie_store(true)
            .build()
            .map_err(|e| TransportError::InvalidRequest(format!("HTTP client: {e}")))?;
        Ok(Self { client, timeout })
    }

    fn map_error(&self, e: reqwest::Error) -> TransportError {
        if e.is_timeout() {
            TransportError::Timeout(self.timeout)
        } else if e.is_connect() {
            TransportError::Connect(e.to_string())
        } else if e.is_builder() {
            TransportError::InvalidRequest(e.to_string())
        } else {
            TransportError::Http(e.to_string())
        }
    }

    fn build(&self, method: HttpMethod, url: &str, headers: &BTreeMap<String, String>) -> reqwest::RequestBuilder {
        let mut req = match method {
            HttpMethod::Get => self.client.get(url),
            HttpMethod::Post => self.client.post(url).body(Vec::new()),
        };
        for (name, value) in headers {
            req = req.header(name.as_str(), value.as_str());
        }
        req
    }

    async fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        if let Some(session_url) = &request.session_url {
            debug!(url = %session_url, "[Transport] Establishing session");
            let resp = self
                .build(HttpMethod::Get, session_url, &request.headers)
                .send()
                .await
                .map_err(|e| self.map_error(e))?;
            if !resp.status().is_success() {
                warn!(url = %session_url, status = resp.status().as_u16(), "[Transport] Session page failed");
                return Err(TransportError::Session(resp.status().as_u16()));
            }
        }

        let mut resp = self
            .build(request.method, &request.url, &request.headers)
            .send()
            .await
            .map_err(|e| self.map_error(e))?;
        let status = resp.status().as_u16();
        if resp.content_length().is_some_and(|len| len > MAX_BODY_BYTES as u64) {
            return Err(TransportError::BodyTooLarge { limit: MAX_BODY_BYTES });
        }
        // Chunked bodies carry no length up front; stop reading at the limit
        let mut bytes = Vec::new();
        while let Some(chunk) = resp.chunk().await.map_err(|e| self.map_error(e))? {
            append_capped(&mut bytes, &chunk, MAX_BODY_BYTES)?;
        }
        debug!(url = %request.url, status, bytes = bytes.len(), "[Transport] Response received");
        Ok(HttpResponse {
            status,
            body: String::from_utf8_lossy(&bytes).into_owned(),
        })
    }
}

/// Append `chunk` unless the total would pass `limit`.
fn append_capped(buf: &mut Vec<u8>, chunk: &[u8], limit: usize) -> Result<(), TransportError> {
    if buf.len() + chunk.len() > limit {
        return Err(TransportError::BodyTooLarge { limit });
    }
    buf.extend_from_slice(chunk);
    Ok(())
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        request: &HttpRequest,
        cancel: &CancellationToken,
    ) -> Result<HttpResponse, TransportError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(TransportError::Cancelled),
            result = self.execute(request) => result,
        }
    }
}
