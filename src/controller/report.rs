//! Controller request, response and error types.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::ValidationError;
use crate::control::{ConfigUpdate, ConfigurationError, RateConfig};
use crate::run::RunPhase;
use crate::stats::ThroughputSnapshot;

/// Parameters of `start`. `target` is signed so a negative value is
/// reported as a validation error rather than a decode failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StartRequest {
    pub target: i64,
    pub destination: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overrides: Option<ConfigUpdate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStarted {
    pub run_id: Uuid,
    pub target: u64,
    pub destination: String,
    pub config: EffectiveConfig,
}

/// Tunables in effect plus the pool size used by the next start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectiveConfig {
    #[serde(flatten)]
    pub rate: RateConfig,
    pub pool_size: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControlError {
    #[error("invalid start request: {}", describe(.0))]
    InvalidRequest(Vec<ValidationError>),
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error("a run is already active")]
    AlreadyActive,
    #[error("no active run")]
    NoActiveRun,
}

fn describe(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Everything `status` reports. Fields describing a run are absent while
/// no run was ever started.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusReport {
    pub phase: RunPhase,
    pub running: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<Uuid>,
    pub target: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at_ms: Option<u64>,
    pub elapsed_secs: f64,
    pub submitted: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub success_ratio: f64,
    pub requests_per_second: f64,
    pub requests_per_minute: f64,
    pub requests_per_hour: f64,
    pub eta_secs: Option<f64>,
    pub active: usize,
    pub queued: usize,
    pub batches: u64,
    pub rotations: u64,
    pub pool_exhaustions: u64,
    pub config: EffectiveConfig,
}

impl StatusReport {
    pub(crate) fn idle(config: EffectiveConfig, rotations: u64) -> Self {
        Self {
            phase: RunPhase::Idle,
            running: false,
            run_id: None,
            target: 0,
            destination: None,
            started_at_ms: None,
            elapsed_secs: 0.0,
            submitted: 0,
            succeeded: 0,
            failed: 0,
            success_ratio: 0.0,
            requests_per_second: 0.0,
            requests_per_minute: 0.0,
            requests_per_hour: 0.0,
            eta_secs: None,
            active: 0,
            queued: 0,
            batches: 0,
            rotations,
            pool_exhaustions: 0,
            config,
        }
    }

    pub(crate) fn with_throughput(mut self, throughput: ThroughputSnapshot) -> Self {
        self.requests_per_second = throughput.requests_per_second;
        self.requests_per_minute = throughput.requests_per_minute;
        self.requests_per_hour = throughput.requests_per_hour;
        self.eta_secs = throughput.eta_secs;
        self
    }
}
