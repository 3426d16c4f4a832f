//! Run subsystem.
//!
//! # Data Flow
//! ```text
//! Controller::start
//!     → RunContext (phase watch + counters)
//!     → driver.rs: batch loop feeding the dispatcher
//!     → ticker.rs: stats and rate control every tick
//! Both tasks exit when the phase becomes Completed or Stopped.
//! ```

pub mod driver;
pub mod state;
pub mod ticker;

pub use driver::RunDriver;
pub use state::{CounterSnapshot, RunContext, RunPhase};
pub use ticker::TickLoop;
