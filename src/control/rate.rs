//! Live tunables with lock-free reads.
//!
//! The driver reads [`RateConfig`] once per batch. Writers (the tick loop,
//! `set_config`, hot reload) are serialized by a mutex so a tick can never
//! overwrite a concurrent update with a stale base.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use arc_swap::ArcSwap;
use serde::Serialize;

use crate::control::policy::{window_success_rate, Adjustment, RatePolicy};
use crate::control::tunables::{ConfigUpdate, ConfigurationError, RateConfig};
use crate::observability::metrics;
use crate::run::CounterSnapshot;

/// Result of one control tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TickReport {
    /// Success rate over the window since the previous tick.
    pub window_rate: f64,
    pub adjustment: Adjustment,
    pub config: RateConfig,
    /// Pool exhaustions since the previous tick.
    pub exhaustions: u64,
}

#[derive(Debug, Default)]
struct Window {
    previous: CounterSnapshot,
    exhaustions: u64,
}

pub struct RateController {
    policy: RatePolicy,
    current: ArcSwap<RateConfig>,
    window: Mutex<Window>,
}

impl RateController {
    pub fn new(policy: RatePolicy, initial: RateConfig) -> Self {
        metrics::record_tunables(initial.max_concurrency, initial.max_delay_ms);
        Self {
            policy,
            current: ArcSwap::from_pointee(initial),
            window: Mutex::new(Window::default()),
        }
    }

    pub fn current(&self) -> RateConfig {
        **self.current.load()
    }

    pub fn policy(&self) -> &RatePolicy {
        &self.policy
    }

    /// Reset the window baseline for a fresh run whose counters start at 0.
    /// Tunables carry over from the previous run.
    pub fn begin_run(&self, pool_exhaustions: u64) {
        let mut window = self.window.lock().expect("rate window mutex poisoned");
        *window = Window {
            previous: CounterSnapshot::default(),
            exhaustions: pool_exhaustions,
        };
    }

    /// Run the hysteresis policy over the counters accumulated since the
    /// previous tick.
    pub fn tick(&self, counters: CounterSnapshot, pool_exhaustions: u64) -> TickReport {
        let mut window = self.window.lock().expect("rate window mutex poisoned");

        let succeeded = counters.succeeded.saturating_sub(window.previous.succeeded);
        let failed = counters.failed.saturating_sub(window.previous.failed);
        let window_rate = window_success_rate(succeeded, failed);
        let exhaustions = pool_exhaustions.saturating_sub(window.exhaustions);
        window.previous = counters;
        window.exhaustions = pool_exhaustions;

        let current = self.current();
        let (next, adjustment) = self.policy.adjust(current, window_rate);
        if next != current {
            self.current.store(Arc::new(next));
            tracing::info!(
                adjustment = ?adjustment,
                window_rate,
                max_concurrency = next.max_concurrency,
                max_delay_ms = next.max_delay_ms,
                "Rate adjusted"
            );
        } else {
            tracing::debug!(adjustment = ?adjustment, window_rate, "Rate unchanged");
        }
        if exhaustions > 0 {
            tracing::warn!(exhaustions, "Context pool exhausted during tick, consider raising pool_size");
        }
        metrics::record_tunables(next.max_concurrency, next.max_delay_ms);

        TickReport {
            window_rate,
            adjustment,
            config: next,
            exhaustions,
        }
    }

    /// Validate and apply a partial update. On error nothing changes.
    pub fn apply(&self, update: &ConfigUpdate) -> Result<RateConfig, ConfigurationError> {
        let _window = self.window.lock().expect("rate window mutex poisoned");
        let next = self
            .current()
            .merged(update, self.policy.concurrency_ceiling)?;
        self.current.store(Arc::new(next));
        metrics::record_tunables(next.max_concurrency, next.max_delay_ms);
        Ok(next)
    }

    /// Pause between batches for the run's cumulative success ratio.
    pub fn batch_delay(&self, success_ratio: f64) -> Duration {
        self.policy.batch_delay(success_ratio)
    }
}
