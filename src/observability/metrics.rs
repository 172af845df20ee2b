//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by method, status, service
//! - `gateway_request_duration_seconds` (histogram): latency by service
//! - `gateway_upstream_errors_total` (counter): failed forwards by service
//! - `gateway_plugin_rejections_total` (counter): short-circuits by plugin, status
//! - `gateway_config_reloads_total` (counter): reload attempts by outcome

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Service label used for requests that matched no route.
pub const NO_SERVICE: &str = "none";

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_request(method: &str, status: u16, service: &str, start: Instant) {
    counter!(
        "gateway_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "service" => service.to_string()
    )
    .increment(1);
    histogram!("gateway_request_duration_seconds", "service" => service.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_upstream_error(service: &str) {
    counter!("gateway_upstream_errors_total", "service" => service.to_string()).increment(1);
}

pub fn record_plugin_rejection(plugin: &'static str, status: u16) {
    counter!(
        "gateway_plugin_rejections_total",
        "plugin" => plugin,
        "status" => status.to_string()
    )
    .increment(1);
}

pub fn record_config_reload(outcome: &'static str) {
    counter!("gateway_config_reloads_total", "outcome" => outcome).increment(1);
}
