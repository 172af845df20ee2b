//! `request_size_limiting`: rejects request bodies that reach the allowed size.
//!
//! # Design Decisions
//! - The body is buffered once, reading at most `allowed_payload_size` bytes
//! - Bodies of `allowed_payload_size` bytes or more get 413
//! - A missing or non-integer limit rejects every request (fail closed)
//! - A body that cannot be read is rejected the same way
//! - Accepted bodies are handed on as the buffered bytes, readable from the start

use axum::{
    body::Body,
    http::{Request, StatusCode},
};

use crate::plugins::{handler_fn, reject, Handler, PluginDecl, PluginError};

pub const NAME: &str = "request_size_limiting";

pub const ALLOWED_PAYLOAD_SIZE: &str = "allowed_payload_size";

pub fn middleware(decl: &PluginDecl, next: Handler) -> Result<Handler, PluginError> {
    let limit = decl
        .input_u64(ALLOWED_PAYLOAD_SIZE)
        .and_then(|n| usize::try_from(n).ok());

    if limit.is_none() {
        tracing::warn!(
            plugin = NAME,
            "Missing or invalid `allowed_payload_size`, every request will be rejected"
        );
    }

    Ok(handler_fn(move |req: Request<Body>| {
        let next = next.clone();
        async move {
            let Some(limit) = limit else {
                return reject(NAME, StatusCode::PAYLOAD_TOO_LARGE);
            };

            let (parts, body) = req.into_parts();
            let bytes = match axum::body::to_bytes(body, limit).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::debug!(plugin = NAME, limit, error = %e, "Request body rejected");
                    return reject(NAME, StatusCode::PAYLOAD_TOO_LARGE);
                }
            };

            if bytes.len() >= limit {
                tracing::debug!(plugin = NAME, limit, size = bytes.len(), "Request body too large");
                return reject(NAME, StatusCode::PAYLOAD_TOO_LARGE);
            }

            next(Request::from_parts(parts, Body::from(bytes))).await
        }
    }))
}
