//! API gateway library.
//!
//! Routes HTTP requests to upstream services by method and path template,
//! runs each service's plugin chain, and hot-reloads its routing document.

pub mod config;
pub mod gateway;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod plugins;
pub mod routing;

pub use config::{Configuration, GatewaySettings};
pub use gateway::{PipelineBuilder, Snapshot, SnapshotPublisher};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use plugins::PluginRegistry;
