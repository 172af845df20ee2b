//! Configuration schema definitions.
//!
//! Two families of types live here:
//! - the routing document (`services`, `routes`, `plugins`) read from the
//!   hot-reloaded YAML source
//! - the process settings (`GatewaySettings`) fixed for the lifetime of the process

use std::path::PathBuf;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Root of the routing document.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ConfigDocument {
    /// Services in match-priority order.
    #[serde(default, deserialize_with = "nullable")]
    pub services: Vec<ServiceConfig>,
}

/// An upstream service with its plugins and routes.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ServiceConfig {
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,

    /// Absolute upstream base URL.
    #[serde(default, deserialize_with = "nullable")]
    pub url: String,

    /// Plugins applied to every route of the service, outermost first.
    #[serde(default, deserialize_with = "nullable")]
    pub plugins: Vec<PluginDecl>,

    #[serde(default, deserialize_with = "nullable")]
    pub routes: Vec<RouteConfig>,
}

/// A route declaration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RouteConfig {
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,

    /// Path templates. Only the first one is compiled.
    #[serde(default, deserialize_with = "nullable")]
    pub paths: Vec<String>,

    #[serde(default, deserialize_with = "nullable")]
    pub methods: Vec<String>,
}

/// A plugin declaration: a registered plugin name and its opaque inputs.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct PluginDecl {
    pub name: String,

    #[serde(default, deserialize_with = "nullable")]
    pub input: Map<String, Value>,
}

impl PluginDecl {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            input: Map::new(),
        }
    }

    /// Add an input value.
    pub fn with_input(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.input.insert(key.into(), value.into());
        self
    }

    pub fn input_str(&self, key: &str) -> Option<&str> {
        self.input.get(key).and_then(Value::as_str)
    }

    pub fn input_bool(&self, key: &str) -> Option<bool> {
        self.input.get(key).and_then(Value::as_bool)
    }

    pub fn input_u64(&self, key: &str) -> Option<u64> {
        self.input.get(key).and_then(Value::as_u64)
    }
}

/// Treats an explicit YAML `null` (e.g. `routes:` with nothing after it) as the default.
fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Process-level settings for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewaySettings {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Routing document source and polling.
    pub reload: ReloadConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Shared upstream connection pool.
    pub upstream: UpstreamConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Hot reload of the routing document.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReloadConfig {
    /// Path of the YAML routing document.
    pub source: PathBuf,

    /// How often the source's modification time is checked, in milliseconds.
    pub poll_interval_ms: u64,
}

impl Default for ReloadConfig {
    fn default() -> Self {
        Self {
            source: PathBuf::from("config.yaml"),
            poll_interval_ms: 5_000,
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Upstream connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Time allowed for the upstream to answer (headers and body) in seconds.
    pub upstream_secs: u64,

    /// Total time for an inbound request, plugins included, in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            upstream_secs: 30,
            request_secs: 60,
        }
    }
}

/// Upstream connection pool configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Maximum idle connections kept per upstream host.
    pub pool_max_idle_per_host: usize,

    /// Idle connections are closed after this many seconds.
    pub pool_idle_timeout_secs: u64,

    /// Largest request or response body the forwarder will buffer.
    pub max_body_bytes: usize,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            pool_max_idle_per_host: 32,
            pool_idle_timeout_secs: 90,
            max_body_bytes: 10 * 1024 * 1024,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Prometheus endpoint bind address. Metrics are not exported when unset.
    pub metrics_address: Option<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_address: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plugin_inputs() {
        let decl = PluginDecl::new("jwt_auth")
            .with_input("secret", "s3cr3t")
            .with_input("key_in_header", true)
            .with_input("limit", 10);

        assert_eq!(decl.input_str("secret"), Some("s3cr3t"));
        assert_eq!(decl.input_bool("key_in_header"), Some(true));
        assert_eq!(decl.input_u64("limit"), Some(10));
        assert_eq!(decl.input_str("limit"), None);
        assert_eq!(decl.input_bool("missing"), None);
    }

    #[test]
    fn test_null_lists_are_empty() {
        let doc: ConfigDocument = serde_yaml::from_str(
            "services:\n- name: a\n  url: http://localhost:1\n  plugins:\n  routes:\n",
        )
        .unwrap();
        assert_eq!(doc.services.len(), 1);
        assert!(doc.services[0].plugins.is_empty());
        assert!(doc.services[0].routes.is_empty());
    }

    #[test]
    fn test_settings_defaults() {
        let settings = GatewaySettings::default();
        assert_eq!(settings.listener.bind_address, "0.0.0.0:8080");
        assert_eq!(settings.reload.poll_interval_ms, 5_000);
        assert!(settings.observability.metrics_address.is_none());
    }
}
