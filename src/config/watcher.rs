//! Hot reload of the runtime tunables.
//!
//! The watcher re-reads the whole file but forwards only the `[dispatch]`
//! tunables as a [`ConfigUpdate`], which the caller feeds to
//! `Controller::set_config`. Listener, request shape and policy changes need
//! a restart.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::{load_config, ConfigError};
use crate::control::ConfigUpdate;

/// Read the file and extract the tunables a running engine accepts.
pub fn reload_tunables(path: &Path) -> Result<ConfigUpdate, ConfigError> {
    let config = load_config(path)?;
    Ok(ConfigUpdate::from(&config.dispatch))
}

/// Watches the configuration file and emits tunable updates.
pub struct ConfigWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<ConfigUpdate>,
}

impl ConfigWatcher {
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<ConfigUpdate>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        let watcher = Self {
            path: path.to_path_buf(),
            update_tx,
        };
        (watcher, update_rx)
    }

    /// Start watching. Keep the returned handle alive for events to flow.
    ///
    /// Editors often fire several events per save; an update equal to the
    /// last one sent is dropped.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let Self { path, update_tx } = self;
        let watched = path.clone();
        let mut last_sent: Option<ConfigUpdate> = None;

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                let event = match res {
                    Ok(event) => event,
                    Err(e) => {
                        tracing::error!(error = ?e, "Config watch error");
                        return;
                    }
                };
                if !(event.kind.is_modify() || event.kind.is_create()) {
                    return;
                }
                match reload_tunables(&path) {
                    Ok(update) if last_sent.as_ref() == Some(&update) => {
                        tracing::debug!(path = ?path, "Config touched, tunables unchanged");
                    }
                    Ok(update) => {
                        tracing::info!(path = ?path, "Config changed, forwarding tunables");
                        if update_tx.send(update.clone()).is_ok() {
                            last_sent = Some(update);
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Config reload failed, keeping current values");
                    }
                }
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&watched, RecursiveMode::NonRecursive)?;
        tracing::info!(path = ?watched, "Config watcher started");
        Ok(watcher)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn temp_file(name: &str, content: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("surge-{}-{}.toml", name, std::process::id()));
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_reload_extracts_dispatch_tunables() {
        let path = temp_file(
            "reload-ok",
            r#"
            [server]
            bind_address = "127.0.0.1:9999"

            [dispatch]
            max_concurrency = 12
            batch_size = 30
            min_delay_ms = 5
            max_delay_ms = 50
            pool_size = 64
            "#,
        );
        let update = reload_tunables(&path).unwrap();
        fs::remove_file(&path).ok();

        assert_eq!(
            update,
            ConfigUpdate {
                max_concurrency: Some(12),
                batch_size: Some(30),
                min_delay_ms: Some(5),
                max_delay_ms: Some(50),
                pool_size: Some(64),
            }
        );
    }

    #[test]
    fn test_reload_rejects_invalid_file() {
        let path = temp_file("reload-bad", "[dispatch]\nmax_concurrency = \"lots\"\n");
        let result = reload_tunables(&path);
        fs::remove_file(&path).ok();
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }
}
