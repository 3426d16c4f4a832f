//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → EngineConfig (validated, immutable)
//!     → seeds the controller, rate policy and transport at startup
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → tunables forwarded to Controller::set_config
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Runtime tunables change only through the controller's whitelisted update

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, ConfigError};
pub use schema::{
    BatchDelayConfig, DispatchConfig, EngineConfig, LogFormat, ObservabilityConfig,
    RateControlConfig, RequestConfig, RetryConfig, ServerConfig, TimeoutConfig, UpstreamConfig,
};
pub use validation::ValidationError;
