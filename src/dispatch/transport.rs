//! Work units and the transport that executes them.
//!
//! # Responsibilities
//! - Describe one outbound operation (`WorkUnit`)
//! - Execute it against the destination or an upstream override
//! - Classify failures as timeout, network or protocol errors

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderValue, CONTENT_TYPE, HOST};
use reqwest::Method;
use thiserror::Error;
use url::Url;

use crate::config::{RequestConfig, TimeoutConfig};
use crate::pool::RequestContext;
use crate::upstream::Endpoint;

/// Header carrying the per-request correlation id.
pub const X_REQUEST_ID: &str = "x-request-id";

/// One dispatchable outbound operation.
#[derive(Debug, Clone)]
pub struct WorkUnit {
    pub seq: u64,
    pub destination: Arc<Url>,
}

impl WorkUnit {
    pub fn new(seq: u64, destination: Arc<Url>) -> Self {
        Self { seq, destination }
    }
}

/// Result of one unit once it has run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Failure => "failure",
        }
    }
}

/// Why a single attempt failed. Always maps to [`Outcome::Failure`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// No response within the per-attempt deadline.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// Connection or I/O failure.
    #[error("network error: {0}")]
    Network(String),

    /// The endpoint answered with something unacceptable.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl TransportError {
    pub fn kind(&self) -> &'static str {
        match self {
            TransportError::Timeout(_) => "timeout",
            TransportError::Network(_) => "network",
            TransportError::Protocol(_) => "protocol",
        }
    }
}

/// Executes work units. Implemented by [`HttpTransport`] in production and
/// by scripted transports in tests.
pub trait Transport: Send + Sync + 'static {
    fn execute(
        &self,
        unit: &WorkUnit,
        context: &mut RequestContext,
        endpoint: Option<&Endpoint>,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;
}

/// Error building the HTTP transport from configuration.
#[derive(Debug, Error)]
pub enum TransportBuildError {
    #[error("invalid HTTP method '{0}'")]
    Method(String),
    #[error("invalid content type '{0}'")]
    ContentType(String),
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// reqwest-backed transport: one keep-alive client shared by every unit.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    method: Method,
    body: Arc<str>,
    content_type: Option<HeaderValue>,
    success_pointer: Option<String>,
    request_timeout: Duration,
}

impl HttpTransport {
    pub fn from_config(
        request: &RequestConfig,
        timeouts: &TimeoutConfig,
    ) -> Result<Self, TransportBuildError> {
        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|_| TransportBuildError::Method(request.method.clone()))?;
        let content_type = request
            .content_type
            .as_deref()
            .map(|ct| {
                HeaderValue::from_str(ct).map_err(|_| TransportBuildError::ContentType(ct.to_string()))
            })
            .transpose()?;
        let request_timeout = Duration::from_millis(timeouts.request_ms);

        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_millis(timeouts.connect_ms))
            .timeout(request_timeout)
            .pool_max_idle_per_host(request.connection_pool_size)
            .tcp_keepalive(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            method,
            body: Arc::from(request.body.as_str()),
            content_type,
            success_pointer: request.success_pointer.clone().filter(|p| !p.is_empty()),
            request_timeout,
        })
    }

    fn classify(&self, error: reqwest::Error) -> TransportError {
        if error.is_timeout() {
            TransportError::Timeout(self.request_timeout)
        } else if error.is_decode() || error.is_body() {
            TransportError::Protocol(error.to_string())
        } else {
            TransportError::Network(error.to_string())
        }
    }
}

/// Point `url` at `endpoint`, returning the original authority for the
/// `Host` header.
fn override_authority(url: &mut Url, endpoint: &Endpoint) -> Result<String, TransportError> {
    let host = url
        .host_str()
        .ok_or_else(|| TransportError::Protocol(format!("destination '{}' has no host", url)))?;
    let authority = match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    };
    url.set_host(Some(&endpoint.address))
        .map_err(|e| TransportError::Network(format!("invalid endpoint {}: {}", endpoint, e)))?;
    url.set_port(Some(endpoint.port))
        .map_err(|_| TransportError::Network(format!("invalid endpoint port {}", endpoint)))?;
    Ok(authority)
}

impl Transport for HttpTransport {
    async fn execute(
        &self,
        unit: &WorkUnit,
        context: &mut RequestContext,
        endpoint: Option<&Endpoint>,
    ) -> Result<(), TransportError> {
        let mut url = (*unit.destination).clone();
        let host = match endpoint {
            Some(endpoint) => Some(override_authority(&mut url, endpoint)?),
            None => None,
        };

        let mut request = self
            .client
            .request(self.method.clone(), url)
            .header(X_REQUEST_ID, context.next_request_id())
            .body(self.body.to_string());
        if let Some(host) = host {
            request = request.header(HOST, host);
        }
        if let Some(content_type) = &self.content_type {
            request = request.header(CONTENT_TYPE, content_type.clone());
        }

        let response = request.send().await.map_err(|e| self.classify(e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Protocol(format!("unexpected status {}", status)));
        }

        if let Some(pointer) = &self.success_pointer {
            let body: serde_json::Value = response.json().await.map_err(|e| self.classify(e))?;
            if body.pointer(pointer).map_or(true, |v| v.is_null()) {
                return Err(TransportError::Protocol(format!("response lacks '{}'", pointer)));
            }
        }

        Ok(())
    }
}
