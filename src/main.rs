//! surge: adaptive HTTP load generator.
//!
//! ```text
//!                ┌──────────────────────── surge ─────────────────────────┐
//!  control API   │  ┌──────────┐    ┌────────────┐    ┌──────────────┐    │
//!  ──────────────┼─▶│  admin   │───▶│ controller │───▶│ run driver   │    │
//!                │  │  routes  │    │            │    │ (batches)    │    │
//!                │  └──────────┘    └─────┬──────┘    └──────┬───────┘    │
//!                │                        │                  ▼            │
//!                │                  ┌─────▼──────┐    ┌──────────────┐    │   destination
//!                │                  │ tick loop  │    │  dispatcher  │────┼──▶ (via rotated
//!                │                  │ stats+rate │    │ pool/rotator │    │    endpoints)
//!                │                  └────────────┘    └──────────────┘    │
//!                └────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;

use surge::admin::ControlState;
use surge::config::{load_config, watcher::ConfigWatcher, EngineConfig};
use surge::dispatch::HttpTransport;
use surge::lifecycle::wait_for_signal;
use surge::observability::{logging, metrics};
use surge::upstream::{load_endpoints, EndpointRotator};
use surge::{ControlServer, Controller, Shutdown};

/// How long a stopping run may take to drain its in-flight units.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Parser)]
#[command(name = "surge", version, about = "Adaptive HTTP load generator")]
struct Args {
    /// TOML configuration file; watched for tunable changes.
    #[arg(short, long, env = "SURGE_CONFIG")]
    config: Option<PathBuf>,

    /// Upstream endpoint list file, one host:port per line.
    #[arg(short, long)]
    endpoints: Option<PathBuf>,

    /// Control API bind address.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => EngineConfig::default(),
    };
    if let Some(path) = &args.endpoints {
        config.upstream.list_path = Some(path.display().to_string());
    }
    if let Some(bind) = &args.bind {
        config.server.bind_address = bind.clone();
    }

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "surge starting");

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let endpoints = load_endpoints(&config.upstream);
    tracing::info!(
        endpoints = endpoints.len(),
        rotation = config.upstream.rotation_enabled,
        "Upstream endpoints loaded"
    );
    let rotator = Arc::new(EndpointRotator::new(endpoints, config.upstream.rotation_enabled));

    let transport = HttpTransport::from_config(&config.request, &config.timeouts)?;
    let controller = Arc::new(Controller::new(transport, &config, rotator));
    let shutdown = Shutdown::new();

    // Hot reload: tunables only, pushed through the same validated path as
    // the control API.
    let _watcher = match &args.config {
        Some(path) => {
            let (watcher, mut updates) = ConfigWatcher::new(path);
            let watcher = watcher.run()?;
            let controller = controller.clone();
            let mut stop = shutdown.subscribe();
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        Some(update) = updates.recv() => {
                            if let Err(e) = controller.set_config(&update) {
                                tracing::error!(error = %e, "Reloaded tunables rejected");
                            }
                        }
                        _ = stop.recv() => break,
                        else => break,
                    }
                }
            });
            Some(watcher)
        }
        None => None,
    };

    tracing::info!(
        bind_address = %config.server.bind_address,
        auth = config.server.api_key.is_some(),
        max_concurrency = config.dispatch.max_concurrency,
        batch_size = config.dispatch.batch_size,
        "Configuration loaded"
    );

    let listener = TcpListener::bind(&config.server.bind_address).await?;
    let state = ControlState::new(controller.clone(), config.server.api_key.clone());
    let server = ControlServer::new(state, Duration::from_secs(config.server.request_timeout_secs));

    let trigger = shutdown.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        trigger.trigger();
    });

    server.run(listener, shutdown.wait()).await?;

    match tokio::time::timeout(DRAIN_TIMEOUT, controller.shutdown()).await {
        Ok(Some(final_counts)) => tracing::info!(
            succeeded = final_counts.succeeded,
            failed = final_counts.failed,
            "Active run stopped"
        ),
        Ok(None) => {}
        Err(_) => tracing::warn!("Run did not drain in time"),
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
