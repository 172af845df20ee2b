//! Route lookup.
//!
//! # Design Decisions
//! - Pure function over an immutable `Configuration` (thread-safe without locks)
//! - O(n) scan over all routes (acceptable for typical route counts)
//! - Method comparison is exact and case-sensitive
//! - Explicit `None` rather than a silent default

use crate::config::model::{Configuration, Route, Service};

/// A matched service and route.
#[derive(Debug, Clone, Copy)]
pub struct RouteMatch<'a> {
    /// Position of the service in the configuration.
    pub index: usize,
    pub service: &'a Service,
    pub route: &'a Route,
}

/// Find the first service and route accepting `method` and `path`.
pub fn find_route<'a>(config: &'a Configuration, method: &str, path: &str) -> Option<RouteMatch<'a>> {
    config
        .services()
        .iter()
        .enumerate()
        .find_map(|(index, service)| {
            service
                .routes
                .iter()
                .find(|route| route.matches(method, path))
                .map(|route| RouteMatch {
                    index,
                    service,
                    route,
                })
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::SystemTime;

    fn config(yaml: &str) -> Configuration {
        Configuration::from_yaml(yaml.as_bytes(), SystemTime::now()).unwrap()
    }

    const TWO_SERVICES: &str = r#"
services:
- name: api-1
  url: http://localhost:8081
  routes:
  - name: create
    paths: [/posts]
    methods: [POST]
- name: api-2
  url: http://localhost:8082
  routes:
  - name: show
    paths: ['/posts/{id}']
    methods: [GET]
  - name: create-too
    paths: [/posts]
    methods: [POST, PUT]
"#;

    #[test]
    fn test_empty_configuration() {
        assert!(find_route(&Configuration::empty(), "GET", "/").is_none());
    }

    #[test]
    fn test_matches_across_services() {
        let config = config(TWO_SERVICES);

        let m = find_route(&config, "GET", "/posts/1").unwrap();
        assert_eq!(m.index, 1);
        assert_eq!(m.service.name, "api-2");
        assert_eq!(m.route.name, "show");

        let m = find_route(&config, "PUT", "/posts").unwrap();
        assert_eq!(m.service.name, "api-2");
        assert_eq!(m.route.name, "create-too");
    }

    #[test]
    fn test_first_declared_service_wins() {
        let config = config(TWO_SERVICES);
        let m = find_route(&config, "POST", "/posts").unwrap();
        assert_eq!(m.index, 0);
        assert_eq!(m.service.name, "api-1");
        assert_eq!(m.route.name, "create");
    }

    #[test]
    fn test_first_declared_route_wins() {
        let config = config(
            r#"
services:
- name: svc
  url: http://localhost:8081
  routes:
  - name: generic
    paths: ['/items/{id}']
    methods: [GET]
  - name: specific
    paths: [/items/latest]
    methods: [GET]
"#,
        );
        let m = find_route(&config, "GET", "/items/latest").unwrap();
        assert_eq!(m.route.name, "generic");
    }

    #[test]
    fn test_method_filter() {
        let config = config(TWO_SERVICES);
        assert!(find_route(&config, "POST", "/posts/1").is_none());
        assert!(find_route(&config, "DELETE", "/posts").is_none());
        assert!(find_route(&config, "post", "/posts").is_none());
    }

    #[test]
    fn test_path_exactness() {
        let config = config(TWO_SERVICES);
        assert!(find_route(&config, "GET", "/posts").is_none());
        assert!(find_route(&config, "GET", "/posts/1/extra").is_none());
        assert!(find_route(&config, "POST", "/posts/").is_none());
    }

    #[test]
    fn test_route_without_paths_is_skipped() {
        let config = config(
            r#"
services:
- name: svc
  url: http://localhost:8081
  routes:
  - name: unroutable
    methods: [GET]
  - name: fallback
    paths: [/]
    methods: [GET]
"#,
        );
        let m = find_route(&config, "GET", "/").unwrap();
        assert_eq!(m.route.name, "fallback");
    }

    #[test]
    fn test_lookup_is_deterministic() {
        let config = config(TWO_SERVICES);
        for _ in 0..10 {
            let m = find_route(&config, "POST", "/posts").unwrap();
            assert_eq!((m.index, m.route.name.as_str()), (0, "create"));
        }
    }
}
