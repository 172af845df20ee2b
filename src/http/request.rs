//! Request identification.
//!
//! Every inbound request carries an `x-request-id`: the client's own value if
//! it sent one, a fresh UUID v4 otherwise. The id travels upstream with the
//! forwarded request and is echoed on the response.

use axum::http::{HeaderName, HeaderValue, Request};
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Generates UUID v4 request ids.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeRequestUuid;

impl MakeRequestId for MakeRequestUuid {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let id = Uuid::new_v4().to_string();
        HeaderValue::from_str(&id).ok().map(RequestId::new)
    }
}

/// The request id assigned at ingress, if any.
pub fn request_id<B>(request: &Request<B>) -> Option<&str> {
    request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|value| value.to_str().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn test_generates_uuid_v4() {
        let request = Request::new(Body::empty());
        let id = MakeRequestUuid.make_request_id(&request).unwrap();
        let parsed = Uuid::parse_str(id.header_value().to_str().unwrap()).unwrap();
        assert_eq!(parsed.get_version_num(), 4);
    }

    #[test]
    fn test_ids_are_unique() {
        let request = Request::new(Body::empty());
        let a = MakeRequestUuid.make_request_id(&request).unwrap();
        let b = MakeRequestUuid.make_request_id(&request).unwrap();
        assert_ne!(a.header_value(), b.header_value());
    }

    #[test]
    fn test_request_id_lookup() {
        let request = Request::builder()
            .header(X_REQUEST_ID, "abc-123")
            .body(Body::empty())
            .unwrap();
        assert_eq!(request_id(&request), Some("abc-123"));
        assert_eq!(request_id(&Request::new(Body::empty())), None);
    }
}
