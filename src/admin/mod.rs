//! Control API routes.
//!
//! `GET /` is public; everything else sits behind the optional bearer key.

pub mod auth;
pub mod handlers;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::controller::Controller;
use crate::dispatch::HttpTransport;

use self::auth::require_bearer;
use self::handlers::*;

pub type EngineController = Controller<HttpTransport>;

#[derive(Clone)]
pub struct ControlState {
    pub controller: Arc<EngineController>,
    pub api_key: Option<Arc<str>>,
}

impl ControlState {
    pub fn new(controller: Arc<EngineController>, api_key: Option<String>) -> Self {
        Self {
            controller,
            api_key: api_key.filter(|k| !k.is_empty()).map(Arc::from),
        }
    }
}

pub fn control_router(state: ControlState) -> Router {
    let protected = Router::new()
        .route("/status", get(status))
        .route("/start", post(start))
        .route("/stop", post(stop))
        .route("/pause", post(pause))
        .route("/resume", post(resume))
        .route("/config", get(get_config).put(put_config))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_bearer));

    Router::new()
        .route("/", get(root))
        .merge(protected)
        .with_state(state)
}
