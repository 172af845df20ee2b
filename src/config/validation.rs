//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Upstream URLs are absolute `http` or `https` URLs with a host and no
//!   query or fragment
//! - Route path templates compile
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Plugin names and inputs are not checked here; the plugin pipeline
//!   rejects them when the snapshot is built

use thiserror::Error;
use url::Url;

use crate::config::schema::ServiceConfig;
use crate::routing::matcher::InvalidPatternError;

/// A single semantic problem in the routing document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("service `{service}`: invalid upstream url `{url}`: {reason}")]
    InvalidUrl {
        service: String,
        url: String,
        reason: String,
    },

    #[error("service `{service}`: unsupported upstream scheme `{scheme}`, expected `http` or `https`")]
    UnsupportedScheme { service: String, scheme: String },

    #[error("service `{service}` route `{route}`: {source}")]
    InvalidPattern {
        service: String,
        route: String,
        #[source]
        source: InvalidPatternError,
    },
}

/// Parse and check a service's upstream base URL.
pub fn upstream_url(service: &ServiceConfig) -> Result<Url, ValidationError> {
    let url = Url::parse(&service.url).map_err(|e| ValidationError::InvalidUrl {
        service: service.name.clone(),
        url: service.url.clone(),
        reason: e.to_string(),
    })?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ValidationError::UnsupportedScheme {
            service: service.name.clone(),
            scheme: url.scheme().to_string(),
        });
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(ValidationError::InvalidUrl {
            service: service.name.clone(),
            url: service.url.clone(),
            reason: "missing host".to_string(),
        });
    }

    if url.query().is_some() || url.fragment().is_some() {
        return Err(ValidationError::InvalidUrl {
            service: service.name.clone(),
            url: service.url.clone(),
            reason: "query and fragment are not allowed on a base url".to_string(),
        });
    }

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(url: &str) -> ServiceConfig {
        ServiceConfig {
            name: "payments".into(),
            url: url.into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_upstream() {
        let url = upstream_url(&service("http://localhost:8081")).unwrap();
        assert_eq!(url.host_str(), Some("localhost"));
        assert_eq!(url.port(), Some(8081));

        let url = upstream_url(&service("https://api.example.com/v1/")).unwrap();
        assert_eq!(url.scheme(), "https");
        assert_eq!(url.path(), "/v1/");
    }

    #[test]
    fn test_relative_url_rejected() {
        assert!(matches!(
            upstream_url(&service("/payments")),
            Err(ValidationError::InvalidUrl { .. })
        ));
        assert!(matches!(
            upstream_url(&service("")),
            Err(ValidationError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_non_http_scheme_rejected() {
        assert_eq!(
            upstream_url(&service("ftp://files.local")),
            Err(ValidationError::UnsupportedScheme {
                service: "payments".into(),
                scheme: "ftp".into(),
            })
        );
    }

    #[test]
    fn test_query_or_fragment_rejected() {
        for url in ["http://localhost:8081/v1?x=1", "http://localhost:8081/v1#top", "http://localhost:8081/?"] {
            assert!(
                matches!(upstream_url(&service(url)), Err(ValidationError::InvalidUrl { .. })),
                "{url} should be rejected"
            );
        }
    }
}
