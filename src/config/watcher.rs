//! Configuration source poller for hot reload.
//!
//! The watcher stats the source on a fixed interval. When the modification
//! time moves forward it re-reads and re-parses the document and hands the new
//! `Configuration` to a [`ConfigSink`], which publishes it. A failed reload is
//! logged and the previously published configuration stays live.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use arc_swap::ArcSwap;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::config::loader::{modified_time, read_source, BoxError, ConfigError};
use crate::config::model::Configuration;
use crate::observability::metrics;

/// Receives every successfully parsed configuration.
///
/// Publishing must make the whole configuration visible at once. An error
/// rejects the configuration and leaves the previous one in place.
pub trait ConfigSink: Send + Sync + 'static {
    fn publish(&self, config: Configuration) -> Result<(), BoxError>;
}

impl ConfigSink for Arc<ArcSwap<Configuration>> {
    fn publish(&self, config: Configuration) -> Result<(), BoxError> {
        self.store(Arc::new(config));
        Ok(())
    }
}

/// Outcome of a single poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// The source has not changed since the last observed modification.
    Unchanged,
    /// A new configuration was parsed and published.
    Reloaded,
}

/// Polls a configuration source and publishes changes.
pub struct ConfigWatcher<S> {
    path: PathBuf,
    interval: Duration,
    sink: S,
    last_modified: SystemTime,
}

impl<S: ConfigSink> ConfigWatcher<S> {
    /// Load the source once and publish it.
    ///
    /// Fails if the interval is zero or the source cannot be read, parsed or
    /// published; nothing is published in that case.
    pub async fn load(path: &Path, interval: Duration, sink: S) -> Result<Self, ConfigError> {
        if interval.is_zero() {
            return Err(ConfigError::ZeroInterval);
        }

        let source = read_source(path).await?;
        let config = Configuration::from_yaml(&source.data, source.modified)?;
        let services = config.services().len();
        sink.publish(config).map_err(ConfigError::Rejected)?;

        tracing::info!(path = ?path, services, "Configuration loaded");

        Ok(Self {
            path: path.to_path_buf(),
            interval,
            sink,
            last_modified: source.modified,
        })
    }

    /// Check the source once, reloading if it is strictly newer than the last
    /// observed modification.
    ///
    /// The observed modification time advances even when the new content is
    /// rejected, so a broken document is reported once per edit.
    pub async fn poll(&mut self) -> Result<PollOutcome, ConfigError> {
        let modified = modified_time(&self.path).await?;
        if modified <= self.last_modified {
            return Ok(PollOutcome::Unchanged);
        }

        let source = read_source(&self.path).await?;
        self.last_modified = source.modified.max(modified);

        let config = Configuration::from_yaml(&source.data, source.modified)?;
        self.sink.publish(config).map_err(ConfigError::Rejected)?;
        Ok(PollOutcome::Reloaded)
    }

    /// Poll until shutdown is signalled.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(path = ?self.path, interval = ?self.interval, "Config watcher started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.poll().await {
                        Ok(PollOutcome::Unchanged) => {}
                        Ok(PollOutcome::Reloaded) => {
                            tracing::info!(path = ?self.path, "Configuration reloaded");
                            metrics::record_config_reload("success");
                        }
                        Err(e) => {
                            tracing::error!(
                                path = ?self.path,
                                error = %e,
                                "Failed to reload config. Keeping current configuration."
                            );
                            metrics::record_config_reload("failure");
                        }
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Config watcher received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Run the poll loop on a background task.
    pub fn spawn(self, shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    /// Modification time of the last source the watcher acted on.
    pub fn last_modified(&self) -> SystemTime {
        self.last_modified
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}

/// Load `path` once, publish it into `sink`, then keep polling every
/// `interval` on a background task until `shutdown` fires.
pub async fn start<S: ConfigSink>(
    path: &Path,
    interval: Duration,
    sink: S,
    shutdown: broadcast::Receiver<()>,
) -> Result<JoinHandle<()>, ConfigError> {
    let watcher = ConfigWatcher::load(path, interval, sink).await?;
    Ok(watcher.spawn(shutdown))
}
