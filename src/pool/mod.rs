//! Resource pooling subsystem.
//!
//! # Data Flow
//! ```text
//! Dispatcher admits a unit
//!     → resource.rs (lease a context; synthesize one if empty)
//!     → unit executes with the leased context
//!     → lease dropped → context pushed back for the next unit
//! ```
//!
//! # Design Decisions
//! - Never blocks: exhaustion is recovered, not waited out
//! - Simple stack, no eviction, resources are fungible
//! - Lease guard makes release-on-failure automatic

pub mod context;
pub mod resource;

pub use context::RequestContext;
pub use resource::{Lease, Resource, ResourcePool};
