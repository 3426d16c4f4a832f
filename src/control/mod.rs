//! Adaptive rate control.
//!
//! # Data Flow
//! ```text
//! tick loop (every rate_control.tick_ms)
//!     → RateController::tick(counters)      window success rate
//!     → RatePolicy::adjust                   hysteresis band
//!     → ArcSwap<RateConfig>                  read by the driver per batch
//!
//! driver (after each batch)
//!     → RateController::batch_delay(cumulative ratio)
//! ```

pub mod policy;
pub mod rate;
pub mod tunables;

pub use policy::{Adjustment, RatePolicy};
pub use rate::{RateController, TickReport};
pub use tunables::{ConfigUpdate, ConfigurationError, RateConfig, MAX_POOL_SIZE};
