//! Run state machine and counters.
//!
//! # State Transitions
//! ```text
//! Idle → Running: start (controller builds a fresh RunContext)
//! Running ⇄ Paused: pause / resume
//! Running | Paused → Completed: succeeded reaches target
//! Running | Paused → Stopped: stop
//! ```
//!
//! Completed and Stopped are terminal for a context; the next start builds
//! a new one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use url::Url;
use uuid::Uuid;

use crate::dispatch::WorkUnit;

/// Run lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunPhase {
    Idle,
    Running,
    Paused,
    Completed,
    Stopped,
}

impl RunPhase {
    /// Running or Paused.
    pub fn is_active(&self) -> bool {
        matches!(self, RunPhase::Running | RunPhase::Paused)
    }

    /// Completed or Stopped.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunPhase::Completed | RunPhase::Stopped)
    }
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CounterSnapshot {
    pub submitted: u64,
    pub succeeded: u64,
    pub failed: u64,
}

impl CounterSnapshot {
    pub fn completed(&self) -> u64 {
        self.succeeded + self.failed
    }

    /// Cumulative success ratio in `[0, 1]`; 0 before anything completed.
    pub fn success_ratio(&self) -> f64 {
        let completed = self.completed();
        if completed == 0 {
            0.0
        } else {
            self.succeeded as f64 / completed as f64
        }
    }
}

#[derive(Debug, Default)]
struct RunCounters {
    submitted: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
}

/// Explicitly owned state of one run, shared by reference between the
/// driver, the dispatcher, the tick loop and the controller.
#[derive(Debug)]
pub struct RunContext {
    id: Uuid,
    target: u64,
    destination: Arc<Url>,
    started_at: SystemTime,
    started: Instant,
    counters: RunCounters,
    batches: AtomicU64,
    phase: watch::Sender<RunPhase>,
}

impl RunContext {
    /// Create a run that is already Running.
    pub fn new(target: u64, destination: Url) -> Self {
        let (phase, _) = watch::channel(RunPhase::Running);
        Self {
            id: Uuid::new_v4(),
            target,
            destination: Arc::new(destination),
            started_at: SystemTime::now(),
            started: Instant::now(),
            counters: RunCounters::default(),
            batches: AtomicU64::new(0),
            phase,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn target(&self) -> u64 {
        self.target
    }

    pub fn destination(&self) -> &Arc<Url> {
        &self.destination
    }

    /// Wall-clock start, in milliseconds since the Unix epoch.
    pub fn started_at_ms(&self) -> u64 {
        self.started_at
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default()
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn phase(&self) -> RunPhase {
        *self.phase.borrow()
    }

    /// Watch phase changes.
    pub fn subscribe(&self) -> watch::Receiver<RunPhase> {
        self.phase.subscribe()
    }

    /// Move to `to` if the current phase is one of `from`.
    fn transition(&self, from: &[RunPhase], to: RunPhase) -> bool {
        let moved = self.phase.send_if_modified(|phase| {
            if from.contains(phase) {
                *phase = to;
                true
            } else {
                false
            }
        });
        if moved {
            tracing::info!(run_id = %self.id, phase = ?to, "Run phase changed");
        }
        moved
    }

    /// Running → Paused. True if the run is paused afterwards.
    pub fn pause(&self) -> bool {
        self.transition(&[RunPhase::Running], RunPhase::Paused) || self.phase() == RunPhase::Paused
    }

    /// Paused → Running. True if the run is running afterwards.
    pub fn resume(&self) -> bool {
        self.transition(&[RunPhase::Paused], RunPhase::Running) || self.phase() == RunPhase::Running
    }

    /// Running | Paused → Stopped. False if the run had already ended.
    pub fn stop(&self) -> bool {
        self.transition(&[RunPhase::Running, RunPhase::Paused], RunPhase::Stopped)
    }

    /// New units may start only while Running.
    pub fn accepts_work(&self) -> bool {
        self.phase() == RunPhase::Running
    }

    pub fn next_unit(&self, seq: u64) -> WorkUnit {
        WorkUnit::new(seq, self.destination.clone())
    }

    pub fn record_submitted(&self) {
        self.counters.submitted.fetch_add(1, Ordering::SeqCst);
    }

    /// Count a success; the success that reaches the target completes the run.
    pub fn record_success(&self) {
        let succeeded = self.counters.succeeded.fetch_add(1, Ordering::SeqCst) + 1;
        if succeeded >= self.target
            && self.transition(&[RunPhase::Running, RunPhase::Paused], RunPhase::Completed)
        {
            tracing::info!(run_id = %self.id, target = self.target, "Target reached");
        }
    }

    pub fn record_failure(&self) {
        self.counters.failed.fetch_add(1, Ordering::SeqCst);
    }

    /// Record a finished batch, returning the batch count.
    pub fn record_batch(&self) -> u64 {
        self.batches.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn batches(&self) -> u64 {
        self.batches.load(Ordering::Relaxed)
    }

    /// Successes still needed to reach the target.
    pub fn remaining(&self) -> u64 {
        self.target
            .saturating_sub(self.counters.succeeded.load(Ordering::SeqCst))
    }

    /// Consistent snapshot: outcomes are read before `submitted`, so
    /// `succeeded + failed <= submitted` always holds in the result.
    pub fn snapshot(&self) -> CounterSnapshot {
        let succeeded = self.counters.succeeded.load(Ordering::SeqCst);
        let failed = self.counters.failed.load(Ordering::SeqCst);
        let submitted = self.counters.submitted.load(Ordering::SeqCst);
        CounterSnapshot {
            submitted,
            succeeded,
            failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(target: u64) -> RunContext {
        RunContext::new(target, Url::parse("http://127.0.0.1:1/").unwrap())
    }

    #[test]
    fn test_starts_running() {
        let run = run(10);
        assert_eq!(run.phase(), RunPhase::Running);
        assert!(run.accepts_work());
        assert_eq!(run.remaining(), 10);
    }

    #[test]
    fn test_pause_resume_idempotent() {
        let run = run(10);
        assert!(run.pause());
        assert!(run.pause());
        assert_eq!(run.phase(), RunPhase::Paused);
        assert!(!run.accepts_work());

        assert!(run.resume());
        assert!(run.resume());
        assert_eq!(run.phase(), RunPhase::Running);
    }

    #[test]
    fn test_completes_on_target() {
        let run = run(2);
        run.record_submitted();
        run.record_success();
        assert_eq!(run.phase(), RunPhase::Running);

        run.record_submitted();
        run.record_success();
        assert_eq!(run.phase(), RunPhase::Completed);
        assert_eq!(run.remaining(), 0);

        // Terminal: no further moves.
        assert!(!run.stop());
        assert!(!run.resume());
        assert!(!run.pause());
    }

    #[test]
    fn test_stop_from_paused() {
        let run = run(5);
        run.pause();
        assert!(run.stop());
        assert_eq!(run.phase(), RunPhase::Stopped);
        assert!(run.phase().is_terminal());
    }

    #[test]
    fn test_snapshot_ratio() {
        let run = run(10);
        for _ in 0..4 {
            run.record_submitted();
        }
        run.record_success();
        run.record_success();
        run.record_success();
        run.record_failure();

        let snap = run.snapshot();
        assert_eq!(snap.completed(), 4);
        assert!(snap.completed() <= snap.submitted);
        assert!((snap.success_ratio() - 0.75).abs() < f64::EPSILON);
        assert_eq!(CounterSnapshot::default().success_ratio(), 0.0);
    }
}
