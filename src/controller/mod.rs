//! Run controller: the single entry point for operating the engine.
//!
//! # Responsibilities
//! - Validate and start runs, one active at a time
//! - Forward stop / pause / resume to the run and its dispatcher
//! - Assemble status reports from counters, stats and tunables
//! - Read and update tunables, including the pool size used by the next start
//!
//! # Ownership
//! ```text
//! Controller ── Arc<RateController>    persists across runs
//!            ── Arc<EndpointRotator>   persists across runs
//!            └─ ActiveRun              replaced at each start
//!                 ├─ Arc<RunContext>
//!                 ├─ Arc<Dispatcher<T>>
//!                 ├─ Arc<ResourcePool<RequestContext>>
//!                 ├─ Arc<StatsAggregator>
//!                 └─ driver + tick loop task handles
//! ```

pub mod report;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use url::Url;

use crate::config::{EngineConfig, ValidationError};
use crate::control::{ConfigUpdate, ConfigurationError, RateConfig, RateController, RatePolicy};
use crate::dispatch::{DispatchSettings, Dispatcher, Transport};
use crate::pool::{RequestContext, ResourcePool};
use crate::resilience::retries::RetryPolicy;
use crate::run::{CounterSnapshot, RunContext, RunDriver, RunPhase, TickLoop};
use crate::stats::StatsAggregator;
use crate::upstream::EndpointRotator;

pub use report::{ControlError, EffectiveConfig, RunStarted, StartRequest, StatusReport};

/// Settings fixed for the controller's lifetime.
#[derive(Debug, Clone)]
pub struct ControllerSettings {
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
    pub tick_interval: Duration,
    pub pool_size: usize,
}

impl From<&EngineConfig> for ControllerSettings {
    fn from(config: &EngineConfig) -> Self {
        Self {
            request_timeout: Duration::from_millis(config.timeouts.request_ms),
            retry: RetryPolicy::from(&config.retries),
            tick_interval: Duration::from_millis(config.rate_control.tick_ms),
            pool_size: config.dispatch.pool_size,
        }
    }
}

struct ActiveRun<T> {
    run: Arc<RunContext>,
    dispatcher: Arc<Dispatcher<T>>,
    pool: Arc<ResourcePool<RequestContext>>,
    stats: Arc<StatsAggregator>,
    driver: Option<JoinHandle<CounterSnapshot>>,
    ticker: Option<JoinHandle<()>>,
}

pub struct Controller<T> {
    transport: T,
    settings: ControllerSettings,
    pool_size: AtomicUsize,
    rate: Arc<RateController>,
    rotator: Arc<EndpointRotator>,
    current: Mutex<Option<ActiveRun<T>>>,
}

impl<T: Transport + Clone> Controller<T> {
    pub fn new(transport: T, config: &EngineConfig, rotator: Arc<EndpointRotator>) -> Self {
        let settings = ControllerSettings::from(config);
        let rate = RateController::new(
            RatePolicy::from(&config.rate_control),
            RateConfig::from(&config.dispatch),
        );
        Self {
            transport,
            pool_size: AtomicUsize::new(settings.pool_size),
            settings,
            rate: Arc::new(rate),
            rotator,
            current: Mutex::new(None),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<ActiveRun<T>>> {
        self.current.lock().expect("controller mutex poisoned")
    }

    /// Validate and launch a run. Must be called inside a tokio runtime.
    pub fn start(&self, request: StartRequest) -> Result<RunStarted, ControlError> {
        let (target, destination) = validate_start(&request)?;

        let mut current = self.lock();
        if current.as_ref().is_some_and(|active| active.run.phase().is_active()) {
            tracing::warn!("Start rejected, a run is already active");
            return Err(ControlError::AlreadyActive);
        }
        if let Some(overrides) = request.overrides.as_ref().filter(|o| !o.is_empty()) {
            self.apply_update(overrides)?;
        }

        let config = self.rate.current();
        let pool = Arc::new(ResourcePool::with_size(self.pool_size.load(Ordering::Relaxed)));
        let run = Arc::new(RunContext::new(target, destination));
        let stats = Arc::new(StatsAggregator::new(self.settings.tick_interval));
        self.rate.begin_run(0);

        let dispatcher = Arc::new(Dispatcher::new(
            self.transport.clone(),
            DispatchSettings {
                max_concurrency: config.max_concurrency,
                request_timeout: self.settings.request_timeout,
                retry: self.settings.retry.clone(),
            },
            pool.clone(),
            self.rotator.clone(),
            run.clone(),
        ));

        let driver = RunDriver::new(run.clone(), dispatcher.clone(), self.rate.clone());
        let ticker = TickLoop {
            run: run.clone(),
            dispatcher: dispatcher.clone(),
            stats: stats.clone(),
            rate: self.rate.clone(),
            pool: pool.clone(),
            interval: self.settings.tick_interval,
        };

        let started = RunStarted {
            run_id: run.id(),
            target,
            destination: run.destination().to_string(),
            config: EffectiveConfig {
                rate: config,
                pool_size: self.pool_size.load(Ordering::Relaxed),
            },
        };

        *current = Some(ActiveRun {
            run,
            dispatcher,
            pool,
            stats,
            driver: Some(tokio::spawn(driver.run())),
            ticker: Some(tokio::spawn(ticker.run())),
        });
        Ok(started)
    }

    /// Stop the active run. Queued units are dropped; in-flight ones finish.
    pub fn stop(&self) -> Result<(), ControlError> {
        let current = self.lock();
        let active = current.as_ref().ok_or(ControlError::NoActiveRun)?;
        if !active.run.stop() {
            return Err(ControlError::NoActiveRun);
        }
        active.dispatcher.cancel();
        Ok(())
    }

    /// Pause the active run. Idempotent while paused.
    pub fn pause(&self) -> Result<(), ControlError> {
        let current = self.lock();
        let active = current.as_ref().ok_or(ControlError::NoActiveRun)?;
        if !active.run.pause() {
            return Err(ControlError::NoActiveRun);
        }
        active.dispatcher.pause();
        Ok(())
    }

    /// Resume a paused run. Idempotent while running.
    pub fn resume(&self) -> Result<(), ControlError> {
        let current = self.lock();
        let active = current.as_ref().ok_or(ControlError::NoActiveRun)?;
        if !active.run.resume() {
            return Err(ControlError::NoActiveRun);
        }
        active.dispatcher.resume();
        Ok(())
    }

    pub fn status(&self) -> StatusReport {
        let config = self.get_config();
        let current = self.lock();
        let Some(active) = current.as_ref() else {
            return StatusReport::idle(config, self.rotator.rotations());
        };

        let run = &active.run;
        let counters = run.snapshot();
        let phase = run.phase();
        StatusReport {
            phase,
            running: phase.is_active(),
            run_id: Some(run.id()),
            target: run.target(),
            destination: Some(run.destination().to_string()),
            started_at_ms: Some(run.started_at_ms()),
            elapsed_secs: run.elapsed().as_secs_f64(),
            submitted: counters.submitted,
            succeeded: counters.succeeded,
            failed: counters.failed,
            success_ratio: counters.success_ratio(),
            active: active.dispatcher.active(),
            queued: active.dispatcher.queued(),
            batches: run.batches(),
            pool_exhaustions: active.pool.exhaustions(),
            ..StatusReport::idle(config, self.rotator.rotations())
        }
        .with_throughput(active.stats.latest())
    }

    pub fn get_config(&self) -> EffectiveConfig {
        EffectiveConfig {
            rate: self.rate.current(),
            pool_size: self.pool_size.load(Ordering::Relaxed),
        }
    }

    /// Apply a partial update; invalid updates leave everything unchanged.
    pub fn set_config(&self, update: &ConfigUpdate) -> Result<EffectiveConfig, ConfigurationError> {
        self.apply_update(update)?;
        let config = self.get_config();
        tracing::info!(
            max_concurrency = config.rate.max_concurrency,
            batch_size = config.rate.batch_size,
            min_delay_ms = config.rate.min_delay_ms,
            max_delay_ms = config.rate.max_delay_ms,
            pool_size = config.pool_size,
            "Configuration updated"
        );
        Ok(config)
    }

    fn apply_update(&self, update: &ConfigUpdate) -> Result<(), ConfigurationError> {
        self.rate.apply(update)?;
        if let Some(size) = update.pool_size {
            self.pool_size.store(size, Ordering::Relaxed);
        }
        Ok(())
    }

    /// Phase watch of the current run, if one was ever started.
    pub fn subscribe(&self) -> Option<watch::Receiver<RunPhase>> {
        self.lock().as_ref().map(|active| active.run.subscribe())
    }

    /// Stop any active run and wait for its tasks to finish.
    pub async fn shutdown(&self) -> Option<CounterSnapshot> {
        let (driver, ticker) = {
            let mut current = self.lock();
            let active = current.as_mut()?;
            if active.run.stop() {
                active.dispatcher.cancel();
            }
            (active.driver.take(), active.ticker.take())
        };

        if let Some(ticker) = ticker {
            if let Err(e) = ticker.await {
                tracing::error!(error = %e, "Tick loop task failed");
            }
        }
        match driver?.await {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                tracing::error!(error = %e, "Driver task failed");
                None
            }
        }
    }
}

fn validate_start(request: &StartRequest) -> Result<(u64, Url), ControlError> {
    let mut errors = Vec::new();

    let target = match u64::try_from(request.target) {
        Ok(target) if target > 0 => Some(target),
        _ => {
            errors.push(ValidationError::new("target", "must be a positive integer"));
            None
        }
    };

    let destination = match Url::parse(request.destination.trim()) {
        Ok(url) if !matches!(url.scheme(), "http" | "https") => {
            errors.push(ValidationError::new("destination", "scheme must be http or https"));
            None
        }
        Ok(url) if url.host_str().map_or(true, str::is_empty) => {
            errors.push(ValidationError::new("destination", "must include a host"));
            None
        }
        Ok(url) => Some(url),
        Err(e) => {
            errors.push(ValidationError::new("destination", format!("invalid URL: {}", e)));
            None
        }
    };

    match (target, destination) {
        (Some(target), Some(destination)) => Ok((target, destination)),
        _ => Err(ControlError::InvalidRequest(errors)),
    }
}
