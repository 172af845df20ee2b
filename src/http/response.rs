//! Response handling and transformation.
//!
//! # Responsibilities
//! - Strip hop-by-hop headers in both directions
//! - Map forwarding errors to gateway status codes
//!
//! # Design Decisions
//! - Error responses carry no body; the status code is the whole answer
//! - Upstream timeouts result in 504 Gateway Timeout, a request body over the
//!   forwarding limit in 413, every other upstream failure in 502 Bad Gateway

use axum::http::{header, HeaderMap, HeaderName, StatusCode};

use crate::http::forward::ForwardError;

/// Connection-scoped headers that must not be relayed by a proxy (RFC 9110 §7.6.1).
pub const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Remove hop-by-hop headers, including any listed in `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in listed.iter().chain(HOP_BY_HOP.iter()) {
        headers.remove(name);
    }
}

/// Status returned to the client when forwarding fails.
pub fn upstream_failure_status(error: &ForwardError) -> StatusCode {
    match error {
        ForwardError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        ForwardError::RequestTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
        _ => StatusCode::BAD_GATEWAY,
    }
}
