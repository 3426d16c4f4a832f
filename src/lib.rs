//! Adaptive HTTP load-generation engine.
//!
//! A run sends batches of requests at one destination until a target number
//! of successes is reached, adapting concurrency and pacing to the observed
//! success rate. Runs are operated through [`controller::Controller`],
//! exposed over a small JSON control API.

// Core engine
pub mod control;
pub mod controller;
pub mod dispatch;
pub mod pool;
pub mod run;
pub mod stats;
pub mod upstream;

// Control surface
pub mod admin;
pub mod http;

// Cross-cutting concerns
pub mod config;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::EngineConfig;
pub use controller::Controller;
pub use http::ControlServer;
pub use lifecycle::Shutdown;
