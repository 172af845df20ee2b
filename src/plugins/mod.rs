//! Plugin subsystem.
//!
//! # Data Flow
//! ```text
//! Service plugin declarations [p1, p2, p3]
//!     → registry.rs (name → middleware constructor)
//!     → pipeline.rs (wrap terminal handler, last declared first)
//!     → p1(p2(p3(forward)))
//!
//! Request:  p1 → p2 → p3 → forward
//! Response: forward → p3 → p2 → p1
//! ```
//!
//! # Design Decisions
//! - Plugins are resolved and their inputs parsed when a snapshot is built,
//!   never per request
//! - Any plugin may short-circuit by returning a response without calling next
//! - Handlers own no per-request mutable state; whatever they buffer is local
//!   to the request future

pub mod add_header;
pub mod http_log;
pub mod jwt_auth;
pub mod pipeline;
pub mod registry;
pub mod size_limit;

use std::future::Future;
use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
};
use futures_util::future::BoxFuture;
use thiserror::Error;

pub use crate::config::schema::PluginDecl;
pub use pipeline::build;
pub use registry::{MiddlewareConstructor, PluginRegistry};

/// An async request handler: the terminal forwarder or a wrapped plugin.
pub type Handler = Arc<dyn Fn(Request<Body>) -> BoxFuture<'static, Response> + Send + Sync>;

/// Wrap an async function into a [`Handler`].
pub fn handler_fn<F, Fut>(f: F) -> Handler
where
    F: Fn(Request<Body>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    Arc::new(move |req: Request<Body>| -> BoxFuture<'static, Response> { Box::pin(f(req)) })
}

/// Errors raised while resolving or constructing plugins.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PluginError {
    #[error("plugin `{0}` not found")]
    NotFound(String),

    #[error("plugin `{plugin}`: {reason}")]
    InvalidInput { plugin: String, reason: String },
}

impl PluginError {
    pub fn invalid_input(plugin: &str, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            plugin: plugin.to_string(),
            reason: reason.into(),
        }
    }
}

/// Empty-bodied rejection issued by a plugin.
pub(crate) fn reject(plugin: &'static str, status: StatusCode) -> Response {
    crate::observability::metrics::record_plugin_rejection(plugin, status.as_u16());
    status.into_response()
}
