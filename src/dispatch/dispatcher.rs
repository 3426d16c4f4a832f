//! Bounded-concurrency dispatcher.
//!
//! # Responsibilities
//! - Admit submitted units through the admission gate
//! - Lease a request context and pick an upstream endpoint per unit
//! - Execute with deadline and capped retries
//! - Record the outcome on the run's counters
//!
//! # Design Decisions
//! - Per-unit failures are values, never errors that abort a batch
//! - The run's phase is rechecked once a unit is admitted, so a stop or a
//!   reached target is observed before any queued unit starts

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::dispatch::admission::{Admission, DispatchError};
use crate::dispatch::transport::{Outcome, Transport, TransportError, WorkUnit};
use crate::observability::metrics;
use crate::pool::{RequestContext, ResourcePool};
use crate::resilience::retries::RetryPolicy;
use crate::resilience::timeouts::with_deadline;
use crate::run::RunContext;
use crate::upstream::{Endpoint, EndpointRotator};

/// Static per-run dispatcher settings.
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    /// Initial concurrency limit; updated each batch via [`Dispatcher::set_limit`].
    pub max_concurrency: usize,
    /// Deadline for one attempt.
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
}

/// Runs work units with at most `limit` in flight.
pub struct Dispatcher<T> {
    transport: T,
    settings: DispatchSettings,
    admission: Admission,
    pool: Arc<ResourcePool<RequestContext>>,
    rotator: Arc<EndpointRotator>,
    run: Arc<RunContext>,
}

impl<T: Transport> Dispatcher<T> {
    pub fn new(
        transport: T,
        settings: DispatchSettings,
        pool: Arc<ResourcePool<RequestContext>>,
        rotator: Arc<EndpointRotator>,
        run: Arc<RunContext>,
    ) -> Self {
        Self {
            transport,
            admission: Admission::new(settings.max_concurrency),
            settings,
            pool,
            rotator,
            run,
        }
    }

    /// Run one unit, waiting in the queue if the dispatcher is saturated
    /// or paused.
    pub async fn submit(&self, unit: WorkUnit) -> Result<Outcome, DispatchError> {
        let _slot = self.admission.admit().await?;
        if !self.run.accepts_work() {
            tracing::debug!(seq = unit.seq, "Run no longer accepting work, dropping unit");
            return Err(DispatchError::Closed);
        }

        let start = Instant::now();
        self.run.record_submitted();

        let result = {
            let mut context = self.pool.lease();
            let endpoint = self.rotator.next();
            self.execute(&unit, &mut context, endpoint.as_ref()).await
        };

        let outcome = match result {
            Ok(()) => {
                self.run.record_success();
                Outcome::Success
            }
            Err(e) => {
                tracing::debug!(seq = unit.seq, kind = e.kind(), error = %e, "Unit failed");
                self.run.record_failure();
                Outcome::Failure
            }
        };
        metrics::record_unit(outcome.as_str(), start);
        Ok(outcome)
    }

    async fn execute(
        &self,
        unit: &WorkUnit,
        context: &mut RequestContext,
        endpoint: Option<&Endpoint>,
    ) -> Result<(), TransportError> {
        let mut attempt = 1;
        loop {
            let result = with_deadline(
                self.settings.request_timeout,
                self.transport.execute(unit, context, endpoint),
            )
            .await;

            let error = match result {
                Ok(()) => return Ok(()),
                Err(e) => e,
            };
            match self.settings.retry.next_delay(attempt, &error) {
                Some(delay) => {
                    tracing::debug!(seq = unit.seq, attempt, delay = ?delay, error = %error, "Retrying unit");
                    metrics::record_retry();
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                None => return Err(error),
            }
        }
    }

    /// Apply the latest concurrency limit.
    pub fn set_limit(&self, limit: usize) {
        self.admission.set_limit(limit);
    }

    pub fn pause(&self) {
        self.admission.pause();
    }

    pub fn resume(&self) {
        self.admission.resume();
    }

    /// Drop queued units and refuse new ones; in-flight units finish.
    pub fn cancel(&self) {
        let dropped = self.admission.cancel();
        if dropped > 0 {
            tracing::info!(dropped, "Dispatcher cancelled, queued units dropped");
        }
    }

    pub fn limit(&self) -> usize {
        self.admission.limit()
    }

    pub fn active(&self) -> usize {
        self.admission.active()
    }

    pub fn queued(&self) -> usize {
        self.admission.queued()
    }

    pub fn is_paused(&self) -> bool {
        self.admission.is_paused()
    }

    pub fn is_closed(&self) -> bool {
        self.admission.is_closed()
    }
}
