//! Control API server.
//!
//! # Responsibilities
//! - Wrap the control router in the middleware stack
//! - Bind to a listener and serve until the shutdown future resolves

use std::future::Future;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::admin::{control_router, ControlState};

pub struct ControlServer {
    router: Router,
}

impl ControlServer {
    pub fn new(state: ControlState, request_timeout: Duration) -> Self {
        Self {
            router: Self::build_router(state, request_timeout),
        }
    }

    /// Layers run top to bottom on the way in: the request id is assigned
    /// before the trace span opens, so every log line carries it.
    #[allow(deprecated)]
    fn build_router(state: ControlState, request_timeout: Duration) -> Router {
        control_router(state).layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(TimeoutLayer::new(request_timeout)),
        )
    }

    /// The router with every layer applied, for in-process use.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub async fn run<F>(self, listener: TcpListener, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Control API listening");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("Control API stopped");
        Ok(())
    }
}
