//! Round-robin endpoint rotation.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use crate::observability::metrics;
use crate::upstream::Endpoint;

/// Round-robin selector over a fixed endpoint list.
/// Stores an internal counter to rotate through endpoints.
///
/// There is no health tracking: a dead endpoint keeps its turn.
#[derive(Debug, Default)]
pub struct EndpointRotator {
    endpoints: Vec<Endpoint>,
    enabled: bool,
    counter: AtomicUsize,
    rotations: AtomicU64,
}

impl EndpointRotator {
    pub fn new(endpoints: Vec<Endpoint>, enabled: bool) -> Self {
        Self {
            endpoints,
            enabled,
            counter: AtomicUsize::new(0),
            rotations: AtomicU64::new(0),
        }
    }

    /// A rotator that never overrides the destination.
    pub fn disabled() -> Self {
        Self::new(Vec::new(), false)
    }

    /// Next endpoint in cyclic order, or `None` to use the destination directly.
    pub fn next(&self) -> Option<Endpoint> {
        if !self.enabled || self.endpoints.is_empty() {
            return None;
        }

        let index = self.counter.fetch_add(1, Ordering::Relaxed) % self.endpoints.len();
        self.rotations.fetch_add(1, Ordering::Relaxed);
        metrics::record_rotation();
        Some(self.endpoints[index].clone())
    }

    /// Number of endpoints handed out so far.
    pub fn rotations(&self) -> u64 {
        self.rotations.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}
