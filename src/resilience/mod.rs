//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! One work unit:
//!     → timeouts.rs (deadline per attempt)
//!     → On failure: retries.rs (retryable? attempts left? back off)
//!     → backoff.rs (exponential delay with jitter)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every attempt has a deadline
//! - Attempts are capped by configuration, never open-ended
//! - A unit that exhausts its attempts is a Failure, never a fatal error

pub mod backoff;
pub mod retries;
pub mod timeouts;
