//! Batch loop of one run.
//!
//! # Loop
//! ```text
//! wait while Paused (exit on Completed / Stopped)
//!     → read RateConfig, apply max_concurrency to the dispatcher
//!     → submit min(batch_size, remaining) units, micro-delay every 10th
//!     → join the whole batch
//!     → sleep batch_delay(cumulative success ratio)
//! ```
//!
//! A batch never holds more units than successes still needed, so the run
//! cannot overshoot its target.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinSet;

use crate::control::{RateConfig, RateController};
use crate::dispatch::{Dispatcher, Transport};
use crate::run::{CounterSnapshot, RunContext, RunPhase};

/// Units between two micro-delays inside a batch.
const MICRO_DELAY_EVERY: usize = 10;

pub struct RunDriver<T> {
    run: Arc<RunContext>,
    dispatcher: Arc<Dispatcher<T>>,
    rate: Arc<RateController>,
}

impl<T: Transport> RunDriver<T> {
    pub fn new(
        run: Arc<RunContext>,
        dispatcher: Arc<Dispatcher<T>>,
        rate: Arc<RateController>,
    ) -> Self {
        Self {
            run,
            dispatcher,
            rate,
        }
    }

    /// Drive the run until it completes or is stopped. Returns the final
    /// counters.
    pub async fn run(self) -> CounterSnapshot {
        let mut phase = self.run.subscribe();
        let mut seq: u64 = 0;

        tracing::info!(
            run_id = %self.run.id(),
            target = self.run.target(),
            destination = %self.run.destination(),
            "Run started"
        );

        while wait_until_running(&mut phase).await {
            let remaining = self.run.remaining();
            if remaining == 0 {
                break;
            }

            let config = self.rate.current();
            self.dispatcher.set_limit(config.max_concurrency);
            let size = config
                .batch_size
                .min(usize::try_from(remaining).unwrap_or(usize::MAX));

            let launched = self.run_batch(&config, size, &mut seq).await;
            let batch = self.run.record_batch();
            let snapshot = self.run.snapshot();
            tracing::debug!(
                batch,
                launched,
                succeeded = snapshot.succeeded,
                failed = snapshot.failed,
                "Batch finished"
            );

            let delay = self.rate.batch_delay(snapshot.success_ratio());
            if !delay.is_zero() {
                pause_between_batches(delay, &mut phase).await;
            }
        }

        self.dispatcher.cancel();
        let snapshot = self.run.snapshot();
        tracing::info!(
            run_id = %self.run.id(),
            phase = ?self.run.phase(),
            submitted = snapshot.submitted,
            succeeded = snapshot.succeeded,
            failed = snapshot.failed,
            batches = self.run.batches(),
            elapsed = ?self.run.elapsed(),
            "Run finished"
        );
        snapshot
    }

    /// Launch up to `size` units and wait for all of them. Returns how many
    /// were launched; launching stops early once the run leaves Running.
    async fn run_batch(&self, config: &RateConfig, size: usize, seq: &mut u64) -> usize {
        let mut batch = JoinSet::new();
        let mut launched = 0;

        for i in 0..size {
            if !self.run.accepts_work() {
                break;
            }
            if i % MICRO_DELAY_EVERY == 0 {
                tokio::time::sleep(micro_delay(config)).await;
            }

            *seq += 1;
            let unit = self.run.next_unit(*seq);
            let dispatcher = self.dispatcher.clone();
            batch.spawn(async move { dispatcher.submit(unit).await });
            launched += 1;
        }

        while let Some(joined) = batch.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "Unit task panicked");
            }
        }
        launched
    }
}

/// Block while Paused. True once Running, false once the run has ended.
async fn wait_until_running(phase: &mut watch::Receiver<RunPhase>) -> bool {
    phase
        .wait_for(|p| *p != RunPhase::Paused)
        .await
        .map(|p| *p == RunPhase::Running)
        .unwrap_or(false)
}

/// Sleep for the batch delay, cut short by any phase change.
async fn pause_between_batches(delay: Duration, phase: &mut watch::Receiver<RunPhase>) {
    tokio::select! {
        _ = tokio::time::sleep(delay) => {}
        _ = phase.changed() => {}
    }
}

fn micro_delay(config: &RateConfig) -> Duration {
    let low = config.min_delay_ms.min(config.max_delay_ms);
    Duration::from_millis(fastrand::u64(low..=config.max_delay_ms))
}
