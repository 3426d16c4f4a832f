//! Upstream endpoint subsystem.
//!
//! # Data Flow
//! ```text
//! startup
//!     → endpoint.rs (parse inline list + list file)
//!     → rotator.rs (fixed, ordered sequence)
//!
//! per work unit:
//!     → rotator.next() → Some(endpoint): connect there, keep destination Host
//!                      → None: connect to the destination directly
//! ```
//!
//! # Design Decisions
//! - Endpoint list is read-only after startup
//! - Pure round-robin, no health checking or backoff for bad endpoints

pub mod endpoint;
pub mod rotator;

pub use endpoint::{load_endpoint_file, parse_endpoint_list, Endpoint, EndpointParseError};
pub use rotator::EndpointRotator;

use crate::config::UpstreamConfig;

/// Collect inline endpoints and the optional list file into one sequence.
pub fn load_endpoints(config: &UpstreamConfig) -> Vec<Endpoint> {
    let mut endpoints: Vec<Endpoint> = config
        .endpoints
        .iter()
        .filter_map(|raw| match raw.parse() {
            Ok(ep) => Some(ep),
            Err(e) => {
                tracing::warn!(endpoint = %raw, error = %e, "Invalid upstream endpoint");
                None
            }
        })
        .collect();

    if let Some(path) = &config.list_path {
        endpoints.extend(load_endpoint_file(std::path::Path::new(path)));
    }
    endpoints
}
