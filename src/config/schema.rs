//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the engine.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the load generator.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct EngineConfig {
    /// Control API listener.
    pub server: ServerConfig,

    /// Dispatcher sizing and the initial rate tunables.
    pub dispatch: DispatchConfig,

    /// Adaptive rate-control policy.
    pub rate_control: RateControlConfig,

    /// Shape of every outbound request.
    pub request: RequestConfig,

    /// Per-request timeouts.
    pub timeouts: TimeoutConfig,

    /// Retry configuration.
    pub retries: RetryConfig,

    /// Upstream endpoint rotation.
    pub upstream: UpstreamConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Control API listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:3000").
    pub bind_address: String,

    /// Handler timeout in seconds.
    pub request_timeout_secs: u64,

    /// Bearer token required on every control call. `None` disables auth.
    pub api_key: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
            request_timeout_secs: 10,
            api_key: None,
        }
    }
}

/// Dispatcher configuration. The four rate tunables here are only the
/// starting point; the rate controller owns them once the engine runs.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Maximum units executing at once.
    pub max_concurrency: usize,

    /// Units issued per batch.
    pub batch_size: usize,

    /// Lower bound of the intra-batch micro-delay in milliseconds.
    pub min_delay_ms: u64,

    /// Upper bound of the intra-batch micro-delay in milliseconds.
    pub max_delay_ms: u64,

    /// Number of request contexts created up front.
    pub pool_size: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 500,
            batch_size: 100,
            min_delay_ms: 1,
            max_delay_ms: 10,
            pool_size: 1000,
        }
    }
}

/// Rate-control policy: hysteresis band for concurrency and max delay,
/// plus the coarse batch delay table.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateControlConfig {
    /// Tick interval for stats and rate control, in milliseconds.
    pub tick_ms: u64,

    /// Success ratio above which the controller speeds up.
    pub high_watermark: f64,

    /// Success ratio below which the controller slows down.
    pub low_watermark: f64,

    pub concurrency_step: usize,
    pub concurrency_floor: usize,
    pub concurrency_ceiling: usize,

    /// Amount `max_delay_ms` shrinks by on a healthy tick.
    pub delay_step_down_ms: u64,

    /// Amount `max_delay_ms` grows by on an unhealthy tick.
    pub delay_step_up_ms: u64,

    pub delay_floor_ms: u64,
    pub delay_ceiling_ms: u64,

    /// Batch delay table.
    pub batch_delay: BatchDelayConfig,
}

impl Default for RateControlConfig {
    fn default() -> Self {
        Self {
            tick_ms: 1000,
            high_watermark: 0.70,
            low_watermark: 0.30,
            concurrency_step: 50,
            concurrency_floor: 100,
            concurrency_ceiling: 1000,
            delay_step_down_ms: 1,
            delay_step_up_ms: 5,
            delay_floor_ms: 1,
            delay_ceiling_ms: 50,
            batch_delay: BatchDelayConfig::default(),
        }
    }
}

/// Pause inserted after each batch, chosen by cumulative success ratio:
/// above 80% none, above 50% `small_ms`, above 20% `medium_ms`, else `large_ms`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BatchDelayConfig {
    pub small_ms: u64,
    pub medium_ms: u64,
    pub large_ms: u64,
}

impl Default for BatchDelayConfig {
    fn default() -> Self {
        Self {
            small_ms: 5,
            medium_ms: 20,
            large_ms: 50,
        }
    }
}

/// Outbound request shape.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RequestConfig {
    /// HTTP method (e.g., "POST").
    pub method: String,

    /// Request body sent with every unit.
    pub body: String,

    /// Optional `content-type` header.
    pub content_type: Option<String>,

    /// JSON pointer (RFC 6901) that must resolve in the response body for
    /// the unit to count as a success. `None` accepts any 2xx response.
    pub success_pointer: Option<String>,

    /// Idle keep-alive connections kept per host.
    pub connection_pool_size: usize,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            method: "POST".to_string(),
            body: String::new(),
            content_type: None,
            success_pointer: None,
            connection_pool_size: 50,
        }
    }
}

/// Timeout configuration for outbound requests.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in milliseconds.
    pub connect_ms: u64,

    /// Deadline for a single attempt in milliseconds.
    pub request_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_ms: 1000,
            request_ms: 2000,
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per unit, including the first.
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            base_delay_ms: 50,
            max_delay_ms: 500,
        }
    }
}

/// Upstream endpoint rotation.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Rotate through the endpoint list. When false every request goes
    /// straight to the destination.
    pub rotation_enabled: bool,

    /// Inline endpoints ("host:port").
    pub endpoints: Vec<String>,

    /// File with one "host:port" per line, appended to `endpoints`.
    pub list_path: Option<String>,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            rotation_enabled: true,
            endpoints: Vec::new(),
            list_path: None,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
