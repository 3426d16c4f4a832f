//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, bounds ordered, addresses parse)
//! - Check inline upstream endpoints
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: EngineConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::EngineConfig;
use crate::upstream::Endpoint;

/// A single rejected field.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Validate a fully parsed configuration.
pub fn validate_config(config: &EngineConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "server.bind_address",
            format!("'{}' is not a socket address", config.server.bind_address),
        ));
    }
    if config.server.request_timeout_secs == 0 {
        errors.push(ValidationError::new("server.request_timeout_secs", "must be > 0"));
    }
    if matches!(config.server.api_key.as_deref(), Some("")) {
        errors.push(ValidationError::new("server.api_key", "must not be empty when set"));
    }

    let dispatch = &config.dispatch;
    if dispatch.max_concurrency == 0 {
        errors.push(ValidationError::new("dispatch.max_concurrency", "must be > 0"));
    }
    if dispatch.batch_size == 0 {
        errors.push(ValidationError::new("dispatch.batch_size", "must be > 0"));
    }
    if dispatch.max_delay_ms == 0 {
        errors.push(ValidationError::new("dispatch.max_delay_ms", "must be > 0"));
    }
    if dispatch.min_delay_ms > dispatch.max_delay_ms {
        errors.push(ValidationError::new(
            "dispatch.min_delay_ms",
            "must not exceed dispatch.max_delay_ms",
        ));
    }

    let rate = &config.rate_control;
    if rate.tick_ms == 0 {
        errors.push(ValidationError::new("rate_control.tick_ms", "must be > 0"));
    }
    if !(0.0..=1.0).contains(&rate.low_watermark)
        || !(0.0..=1.0).contains(&rate.high_watermark)
        || rate.low_watermark >= rate.high_watermark
    {
        errors.push(ValidationError::new(
            "rate_control.low_watermark",
            "watermarks must satisfy 0 <= low < high <= 1",
        ));
    }
    if rate.concurrency_floor == 0 || rate.concurrency_floor > rate.concurrency_ceiling {
        errors.push(ValidationError::new(
            "rate_control.concurrency_floor",
            "must be > 0 and <= concurrency_ceiling",
        ));
    }
    if dispatch.max_concurrency > rate.concurrency_ceiling {
        errors.push(ValidationError::new(
            "dispatch.max_concurrency",
            "must not exceed rate_control.concurrency_ceiling",
        ));
    }
    if rate.delay_floor_ms == 0 || rate.delay_floor_ms > rate.delay_ceiling_ms {
        errors.push(ValidationError::new(
            "rate_control.delay_floor_ms",
            "must be >= 1 and <= delay_ceiling_ms",
        ));
    }

    if config.timeouts.request_ms == 0 {
        errors.push(ValidationError::new("timeouts.request_ms", "must be > 0"));
    }
    if config.timeouts.connect_ms == 0 {
        errors.push(ValidationError::new("timeouts.connect_ms", "must be > 0"));
    }

    if config.retries.max_attempts == 0 {
        errors.push(ValidationError::new("retries.max_attempts", "must be >= 1"));
    }
    if config.retries.base_delay_ms > config.retries.max_delay_ms {
        errors.push(ValidationError::new(
            "retries.base_delay_ms",
            "must not exceed retries.max_delay_ms",
        ));
    }

    if reqwest::Method::from_bytes(config.request.method.as_bytes()).is_err() {
        errors.push(ValidationError::new(
            "request.method",
            format!("'{}' is not an HTTP method", config.request.method),
        ));
    }
    if let Some(pointer) = &config.request.success_pointer {
        if !pointer.is_empty() && !pointer.starts_with('/') {
            errors.push(ValidationError::new(
                "request.success_pointer",
                "must be a JSON pointer starting with '/'",
            ));
        }
    }

    for (i, raw) in config.upstream.endpoints.iter().enumerate() {
        if let Err(e) = raw.parse::<Endpoint>() {
            errors.push(ValidationError::new(format!("upstream.endpoints[{}]", i), e.to_string()));
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
