//! Parsed, validated routing configuration.
//!
//! A `Configuration` is built in one go from the raw document and never
//! mutated afterwards. Reloads produce a new value.

use std::collections::HashSet;
use std::time::SystemTime;

use url::Url;

use crate::config::loader::ConfigError;
use crate::config::schema::{ConfigDocument, PluginDecl, RouteConfig, ServiceConfig};
use crate::config::validation::{upstream_url, ValidationError};
use crate::routing::matcher::{InvalidPatternError, PathMatcher};

/// An immutable snapshot of services, routes and plugin declarations.
#[derive(Debug, Clone)]
pub struct Configuration {
    services: Vec<Service>,
    modified: SystemTime,
}

impl Configuration {
    /// A configuration with no services.
    pub fn empty() -> Self {
        Self {
            services: Vec::new(),
            modified: SystemTime::UNIX_EPOCH,
        }
    }

    /// Parse and validate a YAML document.
    ///
    /// An empty document yields a configuration with zero services.
    pub fn from_yaml(data: &[u8], modified: SystemTime) -> Result<Self, ConfigError> {
        if is_blank(data) {
            return Self::from_document(ConfigDocument::default(), modified);
        }

        let value: serde_yaml::Value = serde_yaml::from_slice(data)?;
        let document = if value.is_null() {
            ConfigDocument::default()
        } else {
            serde_yaml::from_value(value)?
        };
        Self::from_document(document, modified)
    }

    /// Validate a document and compile its route matchers.
    pub fn from_document(document: ConfigDocument, modified: SystemTime) -> Result<Self, ConfigError> {
        let mut services = Vec::with_capacity(document.services.len());
        let mut errors = Vec::new();

        for service in document.services {
            match Service::from_config(service) {
                Ok(service) => services.push(service),
                Err(mut errs) => errors.append(&mut errs),
            }
        }

        if !errors.is_empty() {
            return Err(ConfigError::Validation(errors));
        }

        Ok(Self { services, modified })
    }

    /// Services in match-priority order.
    pub fn services(&self) -> &[Service] {
        &self.services
    }

    /// Modification time of the source this configuration was read from.
    pub fn modified(&self) -> SystemTime {
        self.modified
    }

    /// True if this configuration's source is strictly newer than `t`.
    pub fn modified_since(&self, t: SystemTime) -> bool {
        self.modified > t
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self::empty()
    }
}

/// True for documents holding nothing but whitespace, comments and markers.
fn is_blank(data: &[u8]) -> bool {
    String::from_utf8_lossy(data).lines().all(|line| {
        let line = line.trim();
        line.is_empty() || line.starts_with('#') || line == "---" || line == "..."
    })
}

/// An upstream service.
#[derive(Debug, Clone)]
pub struct Service {
    pub name: String,
    pub url: Url,
    pub plugins: Vec<PluginDecl>,
    pub routes: Vec<Route>,
}

impl Service {
    fn from_config(config: ServiceConfig) -> Result<Self, Vec<ValidationError>> {
        let mut errors = Vec::new();

        let url = upstream_url(&config).map_err(|e| errors.push(e)).ok();

        let mut routes = Vec::with_capacity(config.routes.len());
        for route in config.routes {
            let route_name = route.name.clone();
            match Route::from_config(route) {
                Ok(route) => routes.push(route),
                Err(source) => errors.push(ValidationError::InvalidPattern {
                    service: config.name.clone(),
                    route: route_name,
                    source,
                }),
            }
        }

        match url {
            Some(url) if errors.is_empty() => Ok(Self {
                name: config.name,
                url,
                plugins: config.plugins,
                routes,
            }),
            _ => Err(errors),
        }
    }
}

/// A path + method matcher belonging to a service.
#[derive(Debug, Clone)]
pub struct Route {
    pub name: String,
    pub paths: Vec<String>,
    pub methods: HashSet<String>,
    matcher: Option<PathMatcher>,
}

impl Route {
    /// Build a route, compiling its first path template.
    ///
    /// A route without path templates is kept but never matches.
    pub fn new(
        name: impl Into<String>,
        paths: Vec<String>,
        methods: impl IntoIterator<Item = impl Into<String>>,
    ) -> Result<Self, InvalidPatternError> {
        let name = name.into();
        let matcher = paths.first().map(|p| PathMatcher::compile(p)).transpose()?;

        if paths.len() > 1 {
            tracing::warn!(
                route = %name,
                ignored = paths.len() - 1,
                "Only the first path template of a route is used"
            );
        }

        Ok(Self {
            name,
            paths,
            methods: methods.into_iter().map(Into::into).collect(),
            matcher,
        })
    }

    fn from_config(config: RouteConfig) -> Result<Self, InvalidPatternError> {
        Self::new(config.name, config.paths, config.methods)
    }

    /// The compiled matcher, absent when the route declares no paths.
    pub fn matcher(&self) -> Option<&PathMatcher> {
        self.matcher.as_ref()
    }

    /// Returns true if `method` is allowed and `path` matches the first template.
    pub fn matches(&self, method: &str, path: &str) -> bool {
        match &self.matcher {
            Some(matcher) => self.methods.contains(method) && matcher.matches(path),
            None => false,
        }
    }
}
