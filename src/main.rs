//! API Gateway
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ───────────────▶ http::server (timeout, request ID, trace)
//!                          │
//!                          ▼
//!                      routing (first service/route match in the live snapshot)
//!                          │                      ▲
//!                          ▼                      │ ArcSwap::store
//!                      plugin chain          config::watcher (mtime poll)
//!                          │
//!                          ▼
//!                      http::forward ───────────────────────▶ Upstream
//!     Client Response                                         Service
//!     ◀────────────── relayed status, headers, body ◀─────────
//! ```

use std::path::PathBuf;

use api_gateway::config::GatewaySettings;
use api_gateway::lifecycle::{self, signals, startup, Shutdown};
use api_gateway::observability::logging;
use api_gateway::plugins::PluginRegistry;
use clap::Parser;

/// HTTP API gateway with hot-reloaded YAML routing.
#[derive(Parser, Debug)]
#[command(name = "api-gateway", version, about)]
struct Args {
    /// Routing document (YAML).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to accept client traffic on.
    #[arg(short, long)]
    listen: Option<String>,

    /// How often the routing document is checked for changes.
    #[arg(long)]
    poll_interval_ms: Option<u64>,

    /// Upstream response timeout in seconds.
    #[arg(long)]
    upstream_timeout_secs: Option<u64>,

    /// Inbound request timeout in seconds.
    #[arg(long)]
    request_timeout_secs: Option<u64>,

    /// Largest request or response body relayed to or from an upstream.
    #[arg(long)]
    max_body_bytes: Option<usize>,

    /// Prometheus scrape endpoint address (disabled when absent).
    #[arg(long)]
    metrics_address: Option<String>,

    /// Log level used when RUST_LOG is unset.
    #[arg(long)]
    log_level: Option<String>,
}

impl Args {
    fn into_settings(self) -> GatewaySettings {
        let mut settings = GatewaySettings::default();
        if let Some(config) = self.config {
            settings.reload.source = config;
        }
        if let Some(listen) = self.listen {
            settings.listener.bind_address = listen;
        }
        if let Some(ms) = self.poll_interval_ms {
            settings.reload.poll_interval_ms = ms;
        }
        if let Some(secs) = self.upstream_timeout_secs {
            settings.timeouts.upstream_secs = secs;
        }
        if let Some(secs) = self.request_timeout_secs {
            settings.timeouts.request_secs = secs;
        }
        if let Some(bytes) = self.max_body_bytes {
            settings.upstream.max_body_bytes = bytes;
        }
        if self.metrics_address.is_some() {
            settings.observability.metrics_address = self.metrics_address;
        }
        if let Some(level) = self.log_level {
            settings.observability.log_level = level;
        }
        settings
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let settings = Args::parse().into_settings();

    logging::init(&settings.observability.log_level);
    tracing::info!("api-gateway v{} starting", env!("CARGO_PKG_VERSION"));

    startup::install_metrics(&settings.observability)?;

    let shutdown = Shutdown::new();
    let gateway = lifecycle::start(&settings, PluginRegistry::with_builtins(), &shutdown).await?;
    signals::forward_signals(shutdown.clone());

    gateway.serve(&shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
