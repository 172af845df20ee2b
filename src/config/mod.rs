//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! routing document (YAML)
//!     → loader.rs (read bytes + modification time)
//!     → model.rs (deserialize, compile route matchers)
//!     → validation.rs (semantic checks)
//!     → Configuration (validated, immutable)
//!
//! On every poll tick:
//!     watcher.rs stats the source
//!     → strictly newer? loader.rs reads it again
//!     → model.rs / validation.rs build a new Configuration
//!     → ConfigSink publishes it with a single atomic swap
//!     → in-flight requests finish on the snapshot they started with
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - A failed reload keeps the last good configuration live
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod model;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, ConfigError};
pub use model::{Configuration, Route, Service};
pub use schema::{
    ConfigDocument, GatewaySettings, ListenerConfig, ObservabilityConfig, PluginDecl,
    ReloadConfig, RouteConfig, ServiceConfig, TimeoutConfig, UpstreamConfig,
};
pub use validation::ValidationError;
pub use watcher::{ConfigSink, ConfigWatcher, PollOutcome};
