//! Generic resource pool.
//!
//! # Responsibilities
//! - Hand out reusable resources without ever blocking
//! - Synthesize a fresh resource when the pool runs dry
//! - Count exhaustion events for the rate controller and metrics

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::observability::metrics;

/// A fungible, reusable resource.
pub trait Resource: Send + 'static {
    /// Build a brand new resource.
    fn create() -> Self;
}

/// Unbounded LIFO stack of resources.
///
/// Releasing the same resource twice is not detected; use [`ResourcePool::lease`]
/// to get release-exactly-once for free.
#[derive(Debug)]
pub struct ResourcePool<R> {
    items: Mutex<Vec<R>>,
    created: AtomicU64,
    exhaustions: AtomicU64,
}

impl<R: Resource> ResourcePool<R> {
    /// Create a pool prefilled with `size` resources.
    pub fn with_size(size: usize) -> Self {
        let items: Vec<R> = (0..size).map(|_| R::create()).collect();
        Self {
            items: Mutex::new(items),
            created: AtomicU64::new(size as u64),
            exhaustions: AtomicU64::new(0),
        }
    }

    /// Take a resource. Never blocks: an empty pool synthesizes a new one.
    pub fn acquire(&self) -> R {
        let pooled = self.items.lock().expect("resource pool mutex poisoned").pop();
        match pooled {
            Some(resource) => resource,
            None => {
                let total = self.exhaustions.fetch_add(1, Ordering::Relaxed) + 1;
                self.created.fetch_add(1, Ordering::Relaxed);
                metrics::record_pool_exhaustion();
                if total == 1 {
                    tracing::warn!("Resource pool exhausted, creating new resources on demand");
                } else {
                    tracing::debug!(exhaustions = total, "Resource pool exhausted, creating new resource");
                }
                R::create()
            }
        }
    }

    /// Return a resource for reuse.
    pub fn release(&self, resource: R) {
        self.items.lock().expect("resource pool mutex poisoned").push(resource);
    }

    /// Acquire a resource wrapped in a guard that releases it on drop.
    pub fn lease(self: &Arc<Self>) -> Lease<R> {
        Lease {
            pool: self.clone(),
            resource: Some(self.acquire()),
        }
    }

    /// Resources currently sitting in the pool.
    pub fn available(&self) -> usize {
        self.items.lock().expect("resource pool mutex poisoned").len()
    }

    /// Total resources ever created, prefill included.
    pub fn created(&self) -> u64 {
        self.created.load(Ordering::Relaxed)
    }

    /// Number of times `acquire` found the pool empty.
    pub fn exhaustions(&self) -> u64 {
        self.exhaustions.load(Ordering::Relaxed)
    }
}

/// A RAII guard holding one checked-out resource.
#[derive(Debug)]
pub struct Lease<R: Resource> {
    pool: Arc<ResourcePool<R>>,
    resource: Option<R>,
}

impl<R: Resource> Deref for Lease<R> {
    type Target = R;
    fn deref(&self) -> &Self::Target {
        self.resource.as_ref().expect("lease already released")
    }
}

impl<R: Resource> DerefMut for Lease<R> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.resource.as_mut().expect("lease already released")
    }
}

impl<R: Resource> Drop for Lease<R> {
    fn drop(&mut self) {
        if let Some(resource) = self.resource.take() {
            self.pool.release(resource);
        }
    }
}
