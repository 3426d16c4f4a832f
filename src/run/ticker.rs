//! Periodic statistics and rate-control tick for one run.
//!
//! # Responsibilities
//! - Every tick while active: fold counters into throughput stats
//! - While Running: run the hysteresis policy (skipped while Paused)
//! - Publish dispatcher occupancy
//! - Exit once the run reaches a terminal phase, leaving final counters
//!   in this run's stats

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{self, MissedTickBehavior};

use crate::control::RateController;
use crate::dispatch::{Dispatcher, Transport};
use crate::observability::metrics;
use crate::pool::{RequestContext, ResourcePool};
use crate::run::{RunContext, RunPhase};
use crate::stats::StatsAggregator;

pub struct TickLoop<T> {
    pub run: Arc<RunContext>,
    pub dispatcher: Arc<Dispatcher<T>>,
    pub stats: Arc<StatsAggregator>,
    pub rate: Arc<RateController>,
    pub pool: Arc<ResourcePool<RequestContext>>,
    pub interval: Duration,
}

impl<T: Transport> TickLoop<T> {
    pub async fn run(self) {
        let mut phase = self.run.subscribe();
        let start = time::Instant::now() + self.interval;
        let mut ticker = time::interval_at(start, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if self.run.phase().is_terminal() {
                        break;
                    }
                    self.tick();
                }
                changed = phase.changed() => {
                    if changed.is_err() || phase.borrow_and_update().is_terminal() {
                        break;
                    }
                }
            }
        }

        self.stats.finish(self.run.snapshot(), self.run.target());
        metrics::record_occupancy(0, 0);
        tracing::debug!(run_id = %self.run.id(), "Tick loop exiting");
    }

    fn tick(&self) {
        let phase = self.run.phase();
        if !phase.is_active() {
            return;
        }

        let counters = self.run.snapshot();
        let throughput = self.stats.tick(counters, self.run.target());
        metrics::record_occupancy(self.dispatcher.active(), self.dispatcher.queued());

        let config = if phase == RunPhase::Running {
            self.rate.tick(counters, self.pool.exhaustions()).config
        } else {
            self.rate.current()
        };

        tracing::info!(
            run_id = %self.run.id(),
            phase = ?phase,
            succeeded = counters.succeeded,
            failed = counters.failed,
            target = self.run.target(),
            rps = format_args!("{:.1}", throughput.requests_per_second),
            success_ratio = format_args!("{:.3}", throughput.success_ratio),
            eta_secs = ?throughput.eta_secs.map(|s| s.round()),
            max_concurrency = config.max_concurrency,
            max_delay_ms = config.max_delay_ms,
            "Run progress"
        );
    }
}
