//! Upstream endpoint abstraction and list loading.

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;

/// A single upstream endpoint: the socket address a request is sent to
/// instead of the destination's own host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Endpoint {
    pub address: String,
    pub port: u16,
}

/// Error parsing a "host:port" endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EndpointParseError {
    #[error("missing ':port' in '{0}'")]
    MissingPort(String),
    #[error("empty host in '{0}'")]
    EmptyHost(String),
    #[error("invalid port in '{0}'")]
    InvalidPort(String),
}

impl Endpoint {
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self {
            address: address.into(),
            port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.address.contains(':') {
            write!(f, "[{}]:{}", self.address, self.port)
        } else {
            write!(f, "{}:{}", self.address, self.port)
        }
    }
}

impl FromStr for Endpoint {
    type Err = EndpointParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();
        let (host, port) = raw
            .rsplit_once(':')
            .ok_or_else(|| EndpointParseError::MissingPort(raw.to_string()))?;
        let host = host.trim_start_matches('[').trim_end_matches(']');
        if host.is_empty() {
            return Err(EndpointParseError::EmptyHost(raw.to_string()));
        }
        let port: u16 = port
            .parse()
            .map_err(|_| EndpointParseError::InvalidPort(raw.to_string()))?;
        if port == 0 {
            return Err(EndpointParseError::InvalidPort(raw.to_string()));
        }
        Ok(Self::new(host, port))
    }
}

/// Parse an endpoint list: one "host:port" per line, blank lines and
/// `#` comments ignored. Malformed lines are skipped with a warning.
pub fn parse_endpoint_list(content: &str) -> Vec<Endpoint> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| match line.parse::<Endpoint>() {
            Ok(endpoint) => Some(endpoint),
            Err(e) => {
                tracing::warn!(line = %line, error = %e, "Skipping invalid endpoint");
                None
            }
        })
        .collect()
}

/// Load an endpoint list file. A missing or unreadable file yields an
/// empty list, which means requests go directly to the destination.
pub fn load_endpoint_file(path: &Path) -> Vec<Endpoint> {
    match fs::read_to_string(path) {
        Ok(content) => {
            let endpoints = parse_endpoint_list(&content);
            tracing::info!(path = ?path, count = endpoints.len(), "Loaded upstream endpoints");
            endpoints
        }
        Err(e) => {
            tracing::warn!(path = ?path, error = %e, "No endpoint list found, using direct connection");
            Vec::new()
        }
    }
}
