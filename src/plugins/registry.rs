//! Plugin registry.
//!
//! Maps plugin names to middleware constructors. The registry is built once at
//! startup and shared read-only (behind an `Arc`) with whatever assembles
//! pipelines, so independent gateways in one process can carry different sets.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::plugins::{add_header, http_log, jwt_auth, size_limit};
use crate::plugins::{Handler, PluginDecl, PluginError};

/// Builds a plugin's handler from its declaration and the next handler in the chain.
pub type MiddlewareConstructor =
    Arc<dyn Fn(&PluginDecl, Handler) -> Result<Handler, PluginError> + Send + Sync>;

/// Names of the plugins registered by [`PluginRegistry::with_builtins`].
pub const BUILTIN_PLUGINS: [&str; 4] = [
    http_log::NAME,
    add_header::NAME,
    jwt_auth::NAME,
    size_limit::NAME,
];

/// Process-wide mapping from plugin name to constructor.
#[derive(Clone, Default)]
pub struct PluginRegistry {
    constructors: HashMap<String, MiddlewareConstructor>,
}

impl PluginRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding `http_log`, `add_header`, `jwt_auth` and `request_size_limiting`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(http_log::NAME, http_log::middleware);
        registry.register(add_header::NAME, add_header::middleware);
        registry.register(jwt_auth::NAME, jwt_auth::middleware);
        registry.register(size_limit::NAME, size_limit::middleware);
        registry
    }

    /// Register a constructor under `name`. Names are case-sensitive and a
    /// later registration replaces an earlier one.
    pub fn register<F>(&mut self, name: impl Into<String>, constructor: F)
    where
        F: Fn(&PluginDecl, Handler) -> Result<Handler, PluginError> + Send + Sync + 'static,
    {
        let name = name.into();
        if self.constructors.insert(name.clone(), Arc::new(constructor)).is_some() {
            tracing::warn!(plugin = %name, "Plugin registered twice, keeping the latest");
        }
    }

    /// Look up the constructor registered under `name`.
    pub fn lookup(&self, name: &str) -> Result<MiddlewareConstructor, PluginError> {
        self.constructors
            .get(name)
            .cloned()
            .ok_or_else(|| PluginError::NotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("plugins", &self.names())
            .finish()
    }
}
