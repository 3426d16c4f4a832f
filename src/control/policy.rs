//! The two rate-control policies.
//!
//! Both read the success-rate signal but stay independent:
//! - `adjust`: hysteresis band over the last tick window, moves
//!   `max_concurrency` and `max_delay_ms` by fixed steps within bounds
//! - `batch_delay`: blunt 4-tier table over the cumulative ratio, pauses
//!   between batches

use std::time::Duration;

use serde::Serialize;

use crate::config::{BatchDelayConfig, RateControlConfig};
use crate::control::RateConfig;

/// What one tick did to the tunables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Adjustment {
    SpeedUp,
    SlowDown,
    Hold,
}

#[derive(Debug, Clone)]
pub struct RatePolicy {
    pub high_watermark: f64,
    pub low_watermark: f64,
    pub concurrency_step: usize,
    pub concurrency_floor: usize,
    pub concurrency_ceiling: usize,
    pub delay_step_down_ms: u64,
    pub delay_step_up_ms: u64,
    pub delay_floor_ms: u64,
    pub delay_ceiling_ms: u64,
    pub batch_delay: BatchDelayConfig,
}

impl From<&RateControlConfig> for RatePolicy {
    fn from(config: &RateControlConfig) -> Self {
        Self {
            high_watermark: config.high_watermark,
            low_watermark: config.low_watermark,
            concurrency_step: config.concurrency_step,
            concurrency_floor: config.concurrency_floor,
            concurrency_ceiling: config.concurrency_ceiling,
            delay_step_down_ms: config.delay_step_down_ms,
            delay_step_up_ms: config.delay_step_up_ms,
            delay_floor_ms: config.delay_floor_ms.max(1),
            delay_ceiling_ms: config.delay_ceiling_ms,
            batch_delay: config.batch_delay.clone(),
        }
    }
}

impl Default for RatePolicy {
    fn default() -> Self {
        Self::from(&RateControlConfig::default())
    }
}

/// Success rate of one window; an empty window counts as 0.
pub fn window_success_rate(succeeded: u64, failed: u64) -> f64 {
    let total = succeeded + failed;
    if total == 0 {
        0.0
    } else {
        succeeded as f64 / total as f64
    }
}

impl RatePolicy {
    /// Apply the hysteresis band. Steps never move a value against their
    /// direction, so a value configured outside the bounds is left alone
    /// rather than jumped to the far bound.
    pub fn adjust(&self, current: RateConfig, rate: f64) -> (RateConfig, Adjustment) {
        let mut next = current;
        let adjustment = if rate > self.high_watermark {
            next.max_concurrency = (current.max_concurrency + self.concurrency_step)
                .min(self.concurrency_ceiling)
                .max(current.max_concurrency);
            let floor = self.delay_floor_ms.max(current.min_delay_ms).max(1);
            next.max_delay_ms = current
                .max_delay_ms
                .saturating_sub(self.delay_step_down_ms)
                .max(floor)
                .min(current.max_delay_ms);
            Adjustment::SpeedUp
        } else if rate < self.low_watermark {
            next.max_concurrency = current
                .max_concurrency
                .saturating_sub(self.concurrency_step)
                .max(self.concurrency_floor)
                .min(current.max_concurrency);
            next.max_delay_ms = (current.max_delay_ms + self.delay_step_up_ms)
                .min(self.delay_ceiling_ms)
                .max(current.max_delay_ms);
            Adjustment::SlowDown
        } else {
            Adjustment::Hold
        };
        (next, adjustment)
    }

    /// Pause after a batch, keyed on the run's cumulative success ratio.
    pub fn batch_delay(&self, success_ratio: f64) -> Duration {
        let ms = if success_ratio > 0.80 {
            0
        } else if success_ratio > 0.50 {
            self.batch_delay.small_ms
        } else if success_ratio > 0.20 {
            self.batch_delay.medium_ms
        } else {
            self.batch_delay.large_ms
        };
        Duration::from_millis(ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(max_concurrency: usize, max_delay_ms: u64) -> RateConfig {
        RateConfig {
            max_concurrency,
            batch_size: 100,
            min_delay_ms: 1,
            max_delay_ms,
        }
    }

    #[test]
    fn test_zero_window_is_zero_rate() {
        assert_eq!(window_success_rate(0, 0), 0.0);
        assert_eq!(window_success_rate(3, 1), 0.75);
    }

    #[test]
    fn test_speed_up_steps_and_clamps() {
        let policy = RatePolicy::default();
        let (next, adj) = policy.adjust(config(500, 10), 0.9);
        assert_eq!(adj, Adjustment::SpeedUp);
        assert_eq!(next.max_concurrency, 550);
        assert_eq!(next.max_delay_ms, 9);

        let (next, _) = policy.adjust(config(980, 1), 0.9);
        assert_eq!(next.max_concurrency, 1000);
        assert_eq!(next.max_delay_ms, 1);
    }

    #[test]
    fn test_slow_down_steps_and_clamps() {
        let policy = RatePolicy::default();
        let (next, adj) = policy.adjust(config(500, 10), 0.1);
        assert_eq!(adj, Adjustment::SlowDown);
        assert_eq!(next.max_concurrency, 450);
        assert_eq!(next.max_delay_ms, 15);

        let (next, _) = policy.adjust(config(120, 48), 0.0);
        assert_eq!(next.max_concurrency, 100);
        assert_eq!(next.max_delay_ms, 50);
    }

    #[test]
    fn test_slow_down_never_raises_low_value() {
        let policy = RatePolicy::default();
        let (next, _) = policy.adjust(config(20, 10), 0.0);
        assert_eq!(next.max_concurrency, 20);
    }

    #[test]
    fn test_dead_zone_holds() {
        let policy = RatePolicy::default();
        for rate in [0.30, 0.5, 0.70] {
            let (next, adj) = policy.adjust(config(500, 10), rate);
            assert_eq!(adj, Adjustment::Hold);
            assert_eq!(next, config(500, 10));
        }
    }

    #[test]
    fn test_delay_floor_respects_min_delay() {
        let policy = RatePolicy::default();
        let mut current = config(500, 5);
        current.min_delay_ms = 5;
        let (next, _) = policy.adjust(current, 1.0);
        assert_eq!(next.max_delay_ms, 5);
    }

    #[test]
    fn test_batch_delay_tiers() {
        let policy = RatePolicy::default();
        assert_eq!(policy.batch_delay(0.95), Duration::ZERO);
        assert_eq!(policy.batch_delay(0.80), Duration::from_millis(5));
        assert_eq!(policy.batch_delay(0.6), Duration::from_millis(5));
        assert_eq!(policy.batch_delay(0.5), Duration::from_millis(20));
        assert_eq!(policy.batch_delay(0.21), Duration::from_millis(20));
        assert_eq!(policy.batch_delay(0.2), Duration::from_millis(50));
        assert_eq!(policy.batch_delay(0.0), Duration::from_millis(50));
    }
}
