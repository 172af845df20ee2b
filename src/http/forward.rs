//! Forwarding client.
//!
//! Sends a matched request to its service's upstream and relays the answer.
//!
//! # Design Decisions
//! - One pooled client is shared by every service
//! - Target is the upstream base URL (trailing `/` trimmed) followed by the
//!   inbound path and query
//! - `Host` is re-derived from the target; hop-by-hop headers are dropped
//! - Redirects are relayed to the caller, never followed
//! - Request and response bodies are buffered in full, up to
//!   `max_body_bytes` each, checked as every chunk arrives; an empty inbound
//!   body is sent as no body at all
//! - The whole exchange is bounded by the upstream timeout

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{Body, Bytes},
    http::{header, uri::PathAndQuery, Request, Uri},
    response::{IntoResponse, Response},
};
use futures_util::StreamExt;
use thiserror::Error;
use url::Url;

use crate::config::{Service, TimeoutConfig, UpstreamConfig};
use crate::http::response::{strip_hop_by_hop, upstream_failure_status};
use crate::observability::metrics;
use crate::plugins::{handler_fn, Handler};

#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("invalid upstream target `{target}`: {reason}")]
    InvalidTarget { target: String, reason: String },

    #[error("failed to build upstream client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("failed to read request body: {0}")]
    RequestBody(#[source] axum::Error),

    #[error("request body exceeds {0} bytes")]
    RequestTooLarge(usize),

    #[error("upstream request failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("failed to read upstream body: {0}")]
    Body(#[source] reqwest::Error),

    #[error("upstream body exceeds {0} bytes")]
    ResponseTooLarge(usize),

    #[error("upstream did not answer within {0:?}")]
    Timeout(Duration),
}

/// Pooled HTTP client for upstream calls.
#[derive(Debug, Clone)]
pub struct Forwarder {
    client: reqwest::Client,
    timeout: Duration,
    max_body_bytes: usize,
}

impl Forwarder {
    pub fn new(upstream: &UpstreamConfig, timeouts: &TimeoutConfig) -> Result<Self, ForwardError> {
        let timeout = Duration::from_secs(timeouts.upstream_secs);
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(timeouts.connect_secs))
            .timeout(timeout)
            .pool_max_idle_per_host(upstream.pool_max_idle_per_host)
            .pool_idle_timeout(Duration::from_secs(upstream.pool_idle_timeout_secs))
            .redirect(reqwest::redirect::Policy::none())
            .tcp_nodelay(true)
            .build()
            .map_err(ForwardError::Client)?;

        Ok(Self {
            client,
            timeout,
            max_body_bytes: upstream.max_body_bytes,
        })
    }

    /// Send `request` to `base` and return the upstream's response.
    pub async fn forward(&self, base: &Url, request: Request<Body>) -> Result<Response, ForwardError> {
        let (parts, body) = request.into_parts();
        let target = target_url(base, &parts.uri)?;

        let mut headers = parts.headers;
        headers.remove(header::HOST);
        strip_hop_by_hop(&mut headers);

        let body = self.read_request_body(body).await?;

        let mut outbound = self.client.request(parts.method, target).headers(headers);
        if !body.is_empty() {
            outbound = outbound.body(body);
        }

        let mut upstream = outbound
            .send()
            .await
            .map_err(|e| self.classify(e, ForwardError::Request))?;

        let status = upstream.status();
        let mut headers = upstream.headers().clone();
        strip_hop_by_hop(&mut headers);

        if upstream.content_length().is_some_and(|len| len > self.max_body_bytes as u64) {
            return Err(ForwardError::ResponseTooLarge(self.max_body_bytes));
        }
        let mut bytes = Vec::new();
        while let Some(chunk) = upstream
            .chunk()
            .await
            .map_err(|e| self.classify(e, ForwardError::Body))?
        {
            if bytes.len() + chunk.len() > self.max_body_bytes {
                return Err(ForwardError::ResponseTooLarge(self.max_body_bytes));
            }
            bytes.extend_from_slice(&chunk);
        }

        let mut response = Response::new(Body::from(bytes));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        Ok(response)
    }

    async fn read_request_body(&self, body: Body) -> Result<Bytes, ForwardError> {
        let mut stream = body.into_data_stream();
        let mut buffer = Vec::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(ForwardError::RequestBody)?;
            if buffer.len() + chunk.len() > self.max_body_bytes {
                return Err(ForwardError::RequestTooLarge(self.max_body_bytes));
            }
            buffer.extend_from_slice(&chunk);
        }
        Ok(Bytes::from(buffer))
    }

    fn classify(&self, error: reqwest::Error, otherwise: fn(reqwest::Error) -> ForwardError) -> ForwardError {
        if error.is_timeout() {
            ForwardError::Timeout(self.timeout)
        } else {
            otherwise(error)
        }
    }
}

/// Upstream URL for an inbound request URI.
pub fn target_url(base: &Url, uri: &Uri) -> Result<Url, ForwardError> {
    let path_and_query = uri.path_and_query().map_or("/", PathAndQuery::as_str);
    let target = format!("{}{}", base.as_str().trim_end_matches('/'), path_and_query);

    match Url::parse(&target) {
        Ok(url) => Ok(url),
        Err(e) => Err(ForwardError::InvalidTarget {
            target,
            reason: e.to_string(),
        }),
    }
}

/// Innermost handler of a service's chain: forwards to the service upstream.
///
/// Failures become an empty 502, or 504 on timeout. A request body over the
/// forwarding limit is answered with 413 before the upstream is contacted.
pub fn terminal(forwarder: Arc<Forwarder>, service: &Service) -> Handler {
    let name: Arc<str> = Arc::from(service.name.as_str());
    let base = Arc::new(service.url.clone());

    handler_fn(move |request: Request<Body>| {
        let forwarder = forwarder.clone();
        let name = name.clone();
        let base = base.clone();
        async move {
            match forwarder.forward(&base, request).await {
                Ok(response) => response,
                Err(e @ ForwardError::RequestTooLarge(_)) => {
                    tracing::info!(service = %name, error = %e, "Request not forwarded");
                    upstream_failure_status(&e).into_response()
                }
                Err(e) => {
                    tracing::error!(service = %name, upstream = %base, error = %e, "Upstream request failed");
                    metrics::record_upstream_error(&name);
                    upstream_failure_status(&e).into_response()
                }
            }
        }
    })
}
