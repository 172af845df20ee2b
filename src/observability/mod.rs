//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via `tracing`)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → Log output (stdout, filtered by RUST_LOG or the configured level)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - Request ID flows from ingress to the upstream and back to the client
//! - Metric updates are cheap; with no exporter installed they are no-ops

pub mod logging;
pub mod metrics;
