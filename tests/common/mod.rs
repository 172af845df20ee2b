//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::fs::{self, File};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use api_gateway::config::{Configuration, GatewaySettings};
use api_gateway::gateway::PipelineBuilder;
use api_gateway::http::{Forwarder, HttpServer};
use api_gateway::plugins::PluginRegistry;
use arc_swap::ArcSwap;
use axum::{
    body::{Body, Bytes},
    http::{HeaderMap, Request, StatusCode},
    Json, Router,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use hmac::{Hmac, Mac};
use serde_json::{json, Map, Value};
use sha2::Sha256;
use tokio::net::TcpListener;
use tower::ServiceExt;

/// Serve `router` on an ephemeral local port.
pub async fn spawn_upstream(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

/// Upstream that answers every request with a JSON description of it.
pub async fn spawn_echo_upstream() -> SocketAddr {
    spawn_upstream(Router::new().fallback(echo)).await
}

async fn echo(request: Request<Body>) -> Json<Value> {
    let (parts, body) = request.into_parts();
    let body = axum::body::to_bytes(body, usize::MAX).await.unwrap_or_default();
    let headers: Map<String, Value> = parts
        .headers
        .iter()
        .map(|(name, value)| (name.to_string(), Value::from(value.to_str().unwrap_or_default())))
        .collect();

    Json(json!({
        "method": parts.method.as_str(),
        "path": parts.uri.path(),
        "query": parts.uri.query(),
        "headers": headers,
        "body": String::from_utf8_lossy(&body),
    }))
}

/// A gateway router serving `yaml` with the builtin plugins.
pub fn gateway_router(yaml: &str) -> Router {
    let settings = GatewaySettings::default();
    let forwarder = Forwarder::new(&settings.upstream, &settings.timeouts).unwrap();
    let builder = PipelineBuilder::new(Arc::new(PluginRegistry::with_builtins()), Arc::new(forwarder));
    let config = Configuration::from_yaml(yaml.as_bytes(), SystemTime::now()).unwrap();
    let live = Arc::new(ArcSwap::from_pointee(builder.build(config).unwrap()));
    HttpServer::new(&settings.timeouts, live).router()
}

/// Drive one request through `router` and collect the response.
pub async fn send(router: &Router, request: Request<Body>) -> (StatusCode, HeaderMap, Bytes) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, headers, body)
}

pub fn request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

/// Write `yaml` to `path` and stamp it with `modified`.
pub fn write_config(path: &Path, yaml: &str, modified: SystemTime) {
    fs::write(path, yaml).unwrap();
    File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(modified)
        .unwrap();
}

/// A modification time `secs` seconds from now.
pub fn later(secs: u64) -> SystemTime {
    SystemTime::now() + Duration::from_secs(secs)
}

/// Compact HS256 token over `claims`.
pub fn sign_hs256(claims: Value, secret: &str) -> String {
    let header = URL_SAFE_NO_PAD.encode(json!({"alg": "HS256", "typ": "JWT"}).to_string());
    let claims = URL_SAFE_NO_PAD.encode(claims.to_string());
    let input = format!("{header}.{claims}");

    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(input.as_bytes());
    let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
    format!("{input}.{signature}")
}

pub fn unix_now() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs()
}
