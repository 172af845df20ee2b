//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the forwarder and the pipeline builder from settings
//! - Load the routing document and publish the first snapshot
//! - Start the config watcher
//! - Bind the listener last

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::config::{watcher, ConfigError, GatewaySettings, ObservabilityConfig};
use crate::gateway::{PipelineBuilder, Snapshot, SnapshotPublisher};
use crate::http::{ForwardError, Forwarder, HttpServer};
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::plugins::PluginRegistry;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to load configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to create upstream client: {0}")]
    Client(#[from] ForwardError),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("invalid metrics address `{0}`")]
    MetricsAddress(String),

    #[error("failed to start metrics exporter: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),
}

/// A gateway that has loaded its configuration and bound its listener.
pub struct Gateway {
    live: Arc<ArcSwap<Snapshot>>,
    server: HttpServer,
    listener: TcpListener,
    watcher: JoinHandle<()>,
}

impl Gateway {
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// The snapshot currently served.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.live.load_full()
    }

    pub fn server(&self) -> &HttpServer {
        &self.server
    }

    /// Serve until `shutdown` fires, then wait for the watcher to exit.
    pub async fn serve(self, shutdown: &Shutdown) -> io::Result<()> {
        self.server.run(self.listener, shutdown.subscribe()).await?;
        if let Err(e) = self.watcher.await {
            tracing::warn!(error = %e, "Config watcher task ended abnormally");
        }
        Ok(())
    }
}

/// Bring the gateway up in order. Nothing is served until the initial
/// configuration has been loaded and its chains built.
pub async fn start(
    settings: &GatewaySettings,
    registry: PluginRegistry,
    shutdown: &Shutdown,
) -> Result<Gateway, StartupError> {
    tracing::debug!(plugins = ?registry.names(), "Plugin registry ready");

    let forwarder = Arc::new(Forwarder::new(&settings.upstream, &settings.timeouts)?);
    let builder = PipelineBuilder::new(Arc::new(registry), forwarder);

    let live = Arc::new(ArcSwap::from_pointee(Snapshot::empty()));
    let publisher = SnapshotPublisher::new(live.clone(), builder);
    let watcher = watcher::start(
        &settings.reload.source,
        Duration::from_millis(settings.reload.poll_interval_ms),
        publisher,
        shutdown.subscribe(),
    )
    .await?;

    let server = HttpServer::new(&settings.timeouts, live.clone());

    let address = &settings.listener.bind_address;
    let listener = match TcpListener::bind(address).await {
        Ok(listener) => listener,
        Err(source) => {
            watcher.abort();
            return Err(StartupError::Bind {
                address: address.clone(),
                source,
            });
        }
    };

    tracing::info!(
        address = %address,
        config = ?settings.reload.source,
        poll_interval_ms = settings.reload.poll_interval_ms,
        "Gateway started"
    );

    Ok(Gateway {
        live,
        server,
        listener,
        watcher,
    })
}

/// Install the Prometheus exporter if a metrics address is configured.
pub fn install_metrics(settings: &ObservabilityConfig) -> Result<(), StartupError> {
    let Some(address) = &settings.metrics_address else {
        return Ok(());
    };
    let addr: SocketAddr = address
        .parse()
        .map_err(|_| StartupError::MetricsAddress(address.clone()))?;
    metrics::init_metrics(addr)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn settings(source: &std::path::Path) -> GatewaySettings {
        let mut settings = GatewaySettings::default();
        settings.listener.bind_address = "127.0.0.1:0".into();
        settings.reload.source = source.to_path_buf();
        settings
    }

    #[tokio::test]
    async fn test_start_publishes_initial_snapshot() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "services:\n- name: posts\n  url: http://localhost:8082\n  routes:\n  - paths: [/posts]\n    methods: [GET]\n"
        )
        .unwrap();

        let shutdown = Shutdown::new();
        let gateway = start(&settings(file.path()), PluginRegistry::with_builtins(), &shutdown)
            .await
            .unwrap();

        assert_eq!(gateway.snapshot().config().services()[0].name, "posts");
        assert_ne!(gateway.local_addr().unwrap().port(), 0);
    }

    #[tokio::test]
    async fn test_missing_source_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let shutdown = Shutdown::new();
        let result = start(
            &settings(&dir.path().join("absent.yaml")),
            PluginRegistry::with_builtins(),
            &shutdown,
        )
        .await;

        assert!(matches!(result, Err(StartupError::Config(ConfigError::Io { .. }))));
    }

    #[tokio::test]
    async fn test_unknown_plugin_is_fatal() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "services:\n- name: a\n  url: http://localhost:1\n  plugins:\n  - name: nope\n"
        )
        .unwrap();

        let shutdown = Shutdown::new();
        let result = start(&settings(file.path()), PluginRegistry::with_builtins(), &shutdown).await;
        assert!(matches!(result, Err(StartupError::Config(ConfigError::Rejected(_)))));
    }

    #[tokio::test]
    async fn test_zero_poll_interval_is_fatal() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "services: []\n").unwrap();

        let mut settings = settings(file.path());
        settings.reload.poll_interval_ms = 0;

        let shutdown = Shutdown::new();
        let result = start(&settings, PluginRegistry::with_builtins(), &shutdown).await;
        assert!(matches!(result, Err(StartupError::Config(ConfigError::ZeroInterval))));
        assert_eq!(shutdown.receiver_count(), 0);
    }

    #[test]
    fn test_invalid_metrics_address() {
        let settings = ObservabilityConfig {
            metrics_address: Some("not an address".into()),
            ..Default::default()
        };
        assert!(matches!(install_metrics(&settings), Err(StartupError::MetricsAddress(_))));
        assert!(install_metrics(&ObservabilityConfig::default()).is_ok());
    }
}
