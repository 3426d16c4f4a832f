//! Runtime tunables and their whitelisted partial update.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{DispatchConfig, ValidationError};

/// Largest pool prefill accepted through `set_config`.
pub const MAX_POOL_SIZE: usize = 1_000_000;

/// Values the driver reads every batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateConfig {
    pub max_concurrency: usize,
    pub batch_size: usize,
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl From<&DispatchConfig> for RateConfig {
    fn from(config: &DispatchConfig) -> Self {
        Self {
            max_concurrency: config.max_concurrency,
            batch_size: config.batch_size,
            min_delay_ms: config.min_delay_ms,
            max_delay_ms: config.max_delay_ms,
        }
    }
}

/// Partial update accepted by `set_config` and as start overrides.
/// Unknown fields are rejected at deserialization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_concurrency: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_delay_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_delay_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool_size: Option<usize>,
}

impl ConfigUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// True if any rate field is set.
    pub fn touches_rate(&self) -> bool {
        self.max_concurrency.is_some()
            || self.batch_size.is_some()
            || self.min_delay_ms.is_some()
            || self.max_delay_ms.is_some()
    }
}

impl From<&DispatchConfig> for ConfigUpdate {
    fn from(config: &DispatchConfig) -> Self {
        Self {
            max_concurrency: Some(config.max_concurrency),
            batch_size: Some(config.batch_size),
            min_delay_ms: Some(config.min_delay_ms),
            max_delay_ms: Some(config.max_delay_ms),
            pool_size: Some(config.pool_size),
        }
    }
}

/// A rejected `set_config`; the previous configuration stays in effect.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid configuration: {}", describe(.errors))]
pub struct ConfigurationError {
    pub errors: Vec<ValidationError>,
}

fn describe(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl RateConfig {
    /// Merge `update` over `self` and validate the result as a whole.
    pub fn merged(
        &self,
        update: &ConfigUpdate,
        concurrency_ceiling: usize,
    ) -> Result<RateConfig, ConfigurationError> {
        let next = RateConfig {
            max_concurrency: update.max_concurrency.unwrap_or(self.max_concurrency),
            batch_size: update.batch_size.unwrap_or(self.batch_size),
            min_delay_ms: update.min_delay_ms.unwrap_or(self.min_delay_ms),
            max_delay_ms: update.max_delay_ms.unwrap_or(self.max_delay_ms),
        };

        let mut errors = Vec::new();
        if next.max_concurrency == 0 || next.max_concurrency > concurrency_ceiling {
            errors.push(ValidationError::new(
                "max_concurrency",
                format!("must be between 1 and {}", concurrency_ceiling),
            ));
        }
        if next.batch_size == 0 {
            errors.push(ValidationError::new("batch_size", "must be > 0"));
        }
        if next.max_delay_ms == 0 {
            errors.push(ValidationError::new("max_delay_ms", "must be > 0"));
        }
        if next.min_delay_ms > next.max_delay_ms {
            errors.push(ValidationError::new("min_delay_ms", "must not exceed max_delay_ms"));
        }
        if let Some(size) = update.pool_size {
            if size > MAX_POOL_SIZE {
                errors.push(ValidationError::new(
                    "pool_size",
                    format!("must not exceed {}", MAX_POOL_SIZE),
                ));
            }
        }

        if errors.is_empty() {
            Ok(next)
        } else {
            Err(ConfigurationError { errors })
        }
    }
}
