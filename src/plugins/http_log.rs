//! `http_log`: logs every request before passing it on.

use axum::{body::Body, http::Request};

use crate::plugins::{handler_fn, Handler, PluginDecl, PluginError};

pub const NAME: &str = "http_log";

pub fn middleware(_decl: &PluginDecl, next: Handler) -> Result<Handler, PluginError> {
    Ok(handler_fn(move |req: Request<Body>| {
        let next = next.clone();
        async move {
            tracing::info!(
                method = %req.method(),
                path = %req.uri().path(),
                "request received"
            );
            next(req).await
        }
    }))
}
