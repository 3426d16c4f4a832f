//! Dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! driver submits WorkUnit
//!     → admission.rs (slot free and not paused? run now : FIFO queue)
//!     → dispatcher.rs (lease context, next endpoint, deadline + retries)
//!     → transport.rs (HTTP request, classify response)
//!     → Outcome recorded on RunContext counters
//!     → slot dropped → queue head admitted
//! ```
//!
//! # Design Decisions
//! - Concurrency is bounded by an explicit gate, not by spawning less
//! - Timeout, network and protocol errors are all plain Failures
//! - Cancellation is cooperative: queued units are dropped, running ones finish

pub mod admission;
pub mod dispatcher;
pub mod transport;

pub use admission::DispatchError;
pub use dispatcher::{DispatchSettings, Dispatcher};
pub use transport::{
    HttpTransport, Outcome, Transport, TransportBuildError, TransportError, WorkUnit, X_REQUEST_ID,
};
