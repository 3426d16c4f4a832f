//! Control API transport.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (request id, trace span, handler timeout)
//!     → admin routes (bearer check, JSON handlers)
//!     → Controller
//! ```

pub mod server;

pub use server::ControlServer;
