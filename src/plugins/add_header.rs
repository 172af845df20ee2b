//! `add_header`: appends the declared headers to the request.
//!
//! Every input entry is a header name mapped to a string value. Anything else
//! is rejected when the pipeline is built.

use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, Request},
};
use serde_json::Value;

use crate::plugins::{handler_fn, Handler, PluginDecl, PluginError};

pub const NAME: &str = "add_header";

pub fn middleware(decl: &PluginDecl, next: Handler) -> Result<Handler, PluginError> {
    let headers = parse_headers(decl)?;

    Ok(handler_fn(move |mut req: Request<Body>| {
        let next = next.clone();
        for (name, value) in &headers {
            req.headers_mut().append(name.clone(), value.clone());
        }
        async move { next(req).await }
    }))
}

fn parse_headers(decl: &PluginDecl) -> Result<Vec<(HeaderName, HeaderValue)>, PluginError> {
    decl.input
        .iter()
        .map(|(name, value)| {
            let Value::String(value) = value else {
                return Err(PluginError::invalid_input(
                    NAME,
                    format!("value of header `{name}` must be a string"),
                ));
            };
            let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
                PluginError::invalid_input(NAME, format!("invalid header name `{name}`"))
            })?;
            let header_value = HeaderValue::from_str(value).map_err(|_| {
                PluginError::invalid_input(NAME, format!("invalid value for header `{name}`"))
            })?;
            Ok((header_name, header_value))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, response::IntoResponse};
    use std::sync::{Arc, Mutex};

    #[tokio::test]
    async fn test_adds_headers_and_keeps_existing_ones() {
        let seen = Arc::new(Mutex::new(None));
        let captured = seen.clone();
        let next = handler_fn(move |req: Request<Body>| {
            let captured = captured.clone();
            async move {
                *captured.lock().unwrap() = Some(req.headers().clone());
                StatusCode::OK.into_response()
            }
        });

        let decl = PluginDecl::new(NAME).with_input("X-Gateway", "api-gateway");
        let handler = middleware(&decl, next).unwrap();

        let req = Request::builder()
            .uri("/")
            .header("X-custom1", "value-1")
            .header("X-custom2", "value-2")
            .body(Body::empty())
            .unwrap();
        assert_eq!(handler(req).await.status(), StatusCode::OK);

        let headers = seen.lock().unwrap().take().unwrap();
        assert_eq!(headers["x-gateway"], "api-gateway");
        assert_eq!(headers["x-custom1"], "value-1");
        assert_eq!(headers["x-custom2"], "value-2");
    }

    #[tokio::test]
    async fn test_appends_to_existing_header() {
        let seen = Arc::new(Mutex::new(Vec::<String>::new()));
        let captured = seen.clone();
        let next = handler_fn(move |req: Request<Body>| {
            let captured = captured.clone();
            async move {
                let values = req
                    .headers()
                    .get_all("x-tag")
                    .iter()
                    .map(|v| v.to_str().unwrap().to_string())
                    .collect();
                *captured.lock().unwrap() = values;
                StatusCode::OK.into_response()
            }
        });

        let handler = middleware(&PluginDecl::new(NAME).with_input("x-tag", "gateway"), next).unwrap();
        let req = Request::builder().header("x-tag", "client").body(Body::empty()).unwrap();
        handler(req).await;

        assert_eq!(*seen.lock().unwrap(), vec!["client", "gateway"]);
    }

    #[test]
    fn test_non_string_value_is_config_error() {
        let next = handler_fn(|_req: Request<Body>| async { StatusCode::OK.into_response() });
        let decl = PluginDecl::new(NAME).with_input("X-Retries", 3);
        assert!(matches!(
            middleware(&decl, next),
            Err(PluginError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_invalid_header_name_is_config_error() {
        let next = handler_fn(|_req: Request<Body>| async { StatusCode::OK.into_response() });
        let decl = PluginDecl::new(NAME).with_input("bad header", "x");
        assert!(matches!(
            middleware(&decl, next),
            Err(PluginError::InvalidInput { .. })
        ));
    }
}
