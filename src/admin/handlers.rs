use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;

use crate::admin::ControlState;
use crate::config::ValidationError;
use crate::control::{ConfigUpdate, ConfigurationError};
use crate::controller::{ControlError, EffectiveConfig, StartRequest, StatusReport};

#[derive(Serialize)]
pub struct ServiceInfo {
    pub name: &'static str,
    pub version: &'static str,
    pub status: &'static str,
    pub routes: &'static [&'static str],
}

/// Rejection body shared by every command route.
#[derive(Debug, Serialize)]
pub struct Rejection {
    pub accepted: bool,
    pub reason: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ValidationError>,
}

pub struct ApiError(ControlError);

impl From<ControlError> for ApiError {
    fn from(e: ControlError) -> Self {
        Self(e)
    }
}

impl From<ConfigurationError> for ApiError {
    fn from(e: ConfigurationError) -> Self {
        Self(ControlError::Configuration(e))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let reason = self.0.to_string();
        let (status, errors) = match self.0 {
            ControlError::InvalidRequest(errors) => (StatusCode::BAD_REQUEST, errors),
            ControlError::Configuration(e) => (StatusCode::UNPROCESSABLE_ENTITY, e.errors),
            ControlError::AlreadyActive | ControlError::NoActiveRun => {
                (StatusCode::CONFLICT, Vec::new())
            }
        };
        tracing::debug!(status = %status, reason = %reason, "Control request rejected");
        let body = Rejection {
            accepted: false,
            reason,
            errors,
        };
        (status, Json(body)).into_response()
    }
}

pub async fn root() -> Json<ServiceInfo> {
    Json(ServiceInfo {
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        routes: &[
            "GET /status",
            "POST /start",
            "POST /stop",
            "POST /pause",
            "POST /resume",
            "GET /config",
            "PUT /config",
        ],
    })
}

pub async fn status(State(state): State<ControlState>) -> Json<StatusReport> {
    Json(state.controller.status())
}

pub async fn start(
    State(state): State<ControlState>,
    Json(request): Json<StartRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let started = state.controller.start(request)?;
    tracing::info!(run_id = %started.run_id, target = started.target, "Run started via control API");
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "accepted": true, "run": started })),
    ))
}

pub async fn stop(State(state): State<ControlState>) -> Result<Json<serde_json::Value>, ApiError> {
    state.controller.stop()?;
    Ok(Json(json!({ "accepted": true })))
}

pub async fn pause(State(state): State<ControlState>) -> Result<Json<serde_json::Value>, ApiError> {
    state.controller.pause()?;
    Ok(Json(json!({ "accepted": true })))
}

pub async fn resume(
    State(state): State<ControlState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.controller.resume()?;
    Ok(Json(json!({ "accepted": true })))
}

pub async fn get_config(State(state): State<ControlState>) -> Json<EffectiveConfig> {
    Json(state.controller.get_config())
}

pub async fn put_config(
    State(state): State<ControlState>,
    Json(update): Json<ConfigUpdate>,
) -> Result<Json<EffectiveConfig>, ApiError> {
    Ok(Json(state.controller.set_config(&update)?))
}
