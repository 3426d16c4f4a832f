//! Throughput statistics.
//!
//! Rates are computed from counter deltas over the tick interval and
//! extrapolated to per-minute and per-hour figures. The latest snapshot is
//! published through an `ArcSwap` so status reads never block the tick loop.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use arc_swap::ArcSwap;
use serde::Serialize;

use crate::observability::metrics;
use crate::run::CounterSnapshot;

/// Throughput over the last tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ThroughputSnapshot {
    pub requests_per_second: f64,
    pub requests_per_minute: f64,
    pub requests_per_hour: f64,
    pub successes_per_second: f64,
    /// Cumulative success ratio of the run.
    pub success_ratio: f64,
    /// Seconds until the target at the current success rate; `None` while
    /// nothing is succeeding.
    pub eta_secs: Option<f64>,
}

/// Seconds to reach the target at `successes_per_second`.
pub fn eta(remaining: u64, successes_per_second: f64) -> Option<f64> {
    if remaining == 0 {
        return Some(0.0);
    }
    if successes_per_second > 0.0 && successes_per_second.is_finite() {
        Some(remaining as f64 / successes_per_second)
    } else {
        None
    }
}

pub struct StatsAggregator {
    interval: Duration,
    previous: Mutex<CounterSnapshot>,
    latest: ArcSwap<ThroughputSnapshot>,
}

impl StatsAggregator {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            previous: Mutex::new(CounterSnapshot::default()),
            latest: ArcSwap::from_pointee(ThroughputSnapshot::default()),
        }
    }

    /// Fold one tick of counters into a fresh snapshot.
    pub fn tick(&self, counters: CounterSnapshot, target: u64) -> ThroughputSnapshot {
        let mut previous = self.previous.lock().expect("stats mutex poisoned");
        let seconds = self.interval.as_secs_f64().max(f64::EPSILON);

        let completed = counters.completed().saturating_sub(previous.completed());
        let succeeded = counters.succeeded.saturating_sub(previous.succeeded);
        *previous = counters;

        let requests_per_second = completed as f64 / seconds;
        let successes_per_second = succeeded as f64 / seconds;
        let remaining = target.saturating_sub(counters.succeeded);

        let snapshot = ThroughputSnapshot {
            requests_per_second,
            requests_per_minute: requests_per_second * 60.0,
            requests_per_hour: requests_per_second * 3600.0,
            successes_per_second,
            success_ratio: counters.success_ratio(),
            eta_secs: eta(remaining, successes_per_second),
        };
        self.latest.store(Arc::new(snapshot));
        metrics::record_throughput(requests_per_second, snapshot.success_ratio);
        snapshot
    }

    /// Refresh the ratio and ETA from final counters. Rates keep the last
    /// full tick's values; a partial interval has no meaningful rate.
    pub fn finish(&self, counters: CounterSnapshot, target: u64) -> ThroughputSnapshot {
        let mut previous = self.previous.lock().expect("stats mutex poisoned");
        *previous = counters;

        let last = self.latest();
        let snapshot = ThroughputSnapshot {
            success_ratio: counters.success_ratio(),
            eta_secs: eta(target.saturating_sub(counters.succeeded), last.successes_per_second),
            ..last
        };
        self.latest.store(Arc::new(snapshot));
        snapshot
    }

    pub fn latest(&self) -> ThroughputSnapshot {
        **self.latest.load()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counters(succeeded: u64, failed: u64) -> CounterSnapshot {
        CounterSnapshot {
            submitted: succeeded + failed,
            succeeded,
            failed,
        }
    }

    #[test]
    fn test_eta_none_at_zero_rate() {
        assert_eq!(eta(100, 0.0), None);
        assert_eq!(eta(0, 0.0), Some(0.0));
    }

    #[test]
    fn test_eta_decreases_with_remaining() {
        let far = eta(1000, 10.0).unwrap();
        let near = eta(100, 10.0).unwrap();
        assert!(near < far);
        assert!((near - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_rates_from_deltas() {
        let stats = StatsAggregator::new(Duration::from_secs(2));
        let first = stats.tick(counters(8, 2), 100);
        assert!((first.requests_per_second - 5.0).abs() < f64::EPSILON);
        assert!((first.requests_per_minute - 300.0).abs() < f64::EPSILON);
        assert!((first.requests_per_hour - 18_000.0).abs() < f64::EPSILON);
        assert!((first.successes_per_second - 4.0).abs() < f64::EPSILON);
        assert!((first.success_ratio - 0.8).abs() < f64::EPSILON);
        assert_eq!(first.eta_secs, Some(92.0 / 4.0));

        let second = stats.tick(counters(8, 2), 100);
        assert_eq!(second.requests_per_second, 0.0);
        assert_eq!(second.eta_secs, None);
        assert_eq!(stats.latest(), second);
    }

    #[test]
    fn test_finish_keeps_last_full_tick_rates() {
        let stats = StatsAggregator::new(Duration::from_secs(1));
        let full = stats.tick(counters(10, 0), 100);
        assert!((full.requests_per_second - 10.0).abs() < f64::EPSILON);

        // A handful of completions in a fraction of the interval.
        let last = stats.finish(counters(13, 1), 100);
        assert_eq!(last.requests_per_second, full.requests_per_second);
        assert_eq!(last.successes_per_second, full.successes_per_second);
        assert!((last.success_ratio - 13.0 / 14.0).abs() < f64::EPSILON);
        assert_eq!(last.eta_secs, Some(87.0 / 10.0));
        assert_eq!(stats.latest(), last);
    }

    #[test]
    fn test_finish_at_target_reports_zero_eta() {
        let stats = StatsAggregator::new(Duration::from_secs(1));
        let last = stats.finish(counters(100, 0), 100);
        assert_eq!(last.eta_secs, Some(0.0));
        assert_eq!(last.requests_per_second, 0.0);
    }
}
