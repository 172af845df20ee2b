//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with the catch-all gateway handler
//! - Wire up middleware (request timeout, request ID, tracing)
//! - Resolve each request against the live snapshot and run its service chain
//! - Serve until the shutdown broadcast fires, draining in-flight requests

use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::TimeoutConfig;
use crate::gateway::Snapshot;
use crate::http::request::{request_id, MakeRequestUuid};
use crate::observability::metrics::{self, NO_SERVICE};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub live: Arc<ArcSwap<Snapshot>>,
}

/// HTTP front end of the gateway.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    /// Create a server that routes against whatever snapshot `live` holds.
    pub fn new(timeouts: &TimeoutConfig, live: Arc<ArcSwap<Snapshot>>) -> Self {
        let state = AppState { live };
        Self {
            router: Self::build_router(timeouts, state),
        }
    }

    #[allow(deprecated)]
    fn build_router(timeouts: &TimeoutConfig, state: AppState) -> Router {
        Router::new()
            .fallback(gateway_handler)
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(timeouts.request_secs)))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(TraceLayer::new_for_http())
    }

    /// The fully layered router, for serving or for driving directly in tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve on `listener` until `shutdown` fires.
    pub async fn run(self, listener: TcpListener, mut shutdown: broadcast::Receiver<()>) -> io::Result<()> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server draining in-flight requests");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Catch-all handler: match a route, then run its service's chain.
async fn gateway_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let request_id = request_id(&request).unwrap_or("unknown").to_string();

    let snapshot = state.live.load_full();
    let Some((matched, chain)) = snapshot.resolve(&method, &path) else {
        tracing::debug!(request_id = %request_id, method = %method, path = %path, "No route matched");
        metrics::record_request(&method, StatusCode::NOT_FOUND.as_u16(), NO_SERVICE, start);
        return StatusCode::NOT_FOUND.into_response();
    };

    let service = matched.service.name.clone();
    tracing::debug!(
        request_id = %request_id,
        method = %method,
        path = %path,
        service = %service,
        route = %matched.route.name,
        "Route matched"
    );

    let chain = chain.clone();
    let response = chain(request).await;
    metrics::record_request(&method, response.status().as_u16(), &service, start);
    response
}
