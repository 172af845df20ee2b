//! Published gateway state.
//!
//! A [`Snapshot`] pairs a [`Configuration`] with one ready-to-run handler
//! chain per service. Snapshots are built off the request path by a
//! [`PipelineBuilder`] and swapped in whole by the [`SnapshotPublisher`], so a
//! request sees either the old routing table and chains or the new ones,
//! never a mix.

use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;
use thiserror::Error;

use crate::config::loader::BoxError;
use crate::config::{ConfigSink, Configuration};
use crate::http::forward::{self, Forwarder};
use crate::plugins::{self, Handler, PluginError, PluginRegistry};
use crate::routing::{find_route, RouteMatch};

/// A service's plugin chain could not be assembled.
#[derive(Debug, Error)]
#[error("service `{service}`: {source}")]
pub struct BuildError {
    pub service: String,
    #[source]
    pub source: PluginError,
}

/// A configuration together with each service's handler chain.
pub struct Snapshot {
    config: Configuration,
    chains: Vec<Handler>,
}

impl Snapshot {
    /// No services; every request is unmatched.
    pub fn empty() -> Self {
        Self {
            config: Configuration::empty(),
            chains: Vec::new(),
        }
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    /// Chain of the service at `index` in configuration order.
    pub fn chain(&self, index: usize) -> Option<&Handler> {
        self.chains.get(index)
    }

    /// The first matching route and the chain of its service.
    pub fn resolve(&self, method: &str, path: &str) -> Option<(RouteMatch<'_>, &Handler)> {
        let matched = find_route(&self.config, method, path)?;
        let chain = self.chains.get(matched.index)?;
        Some((matched, chain))
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Snapshot")
            .field("config", &self.config)
            .field("chains", &self.chains.len())
            .finish()
    }
}

/// Turns configurations into snapshots.
#[derive(Clone)]
pub struct PipelineBuilder {
    registry: Arc<PluginRegistry>,
    forwarder: Arc<Forwarder>,
}

impl PipelineBuilder {
    pub fn new(registry: Arc<PluginRegistry>, forwarder: Arc<Forwarder>) -> Self {
        Self { registry, forwarder }
    }

    /// Build every service's chain. Fails on the first service whose plugins
    /// cannot be resolved or constructed.
    pub fn build(&self, config: Configuration) -> Result<Snapshot, BuildError> {
        let chains = config
            .services()
            .iter()
            .map(|service| {
                let terminal = forward::terminal(self.forwarder.clone(), service);
                plugins::build(&self.registry, &service.plugins, terminal).map_err(|source| BuildError {
                    service: service.name.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Snapshot { config, chains })
    }
}

/// Builds a snapshot for every configuration it receives and makes it live.
#[derive(Clone)]
pub struct SnapshotPublisher {
    live: Arc<ArcSwap<Snapshot>>,
    builder: PipelineBuilder,
}

impl SnapshotPublisher {
    pub fn new(live: Arc<ArcSwap<Snapshot>>, builder: PipelineBuilder) -> Self {
        Self { live, builder }
    }
}

impl ConfigSink for SnapshotPublisher {
    fn publish(&self, config: Configuration) -> Result<(), BoxError> {
        let snapshot = self.builder.build(config)?;
        self.live.store(Arc::new(snapshot));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{TimeoutConfig, UpstreamConfig};
    use std::time::SystemTime;

    const TWO_SERVICES: &str = "
services:
- name: payments
  url: http://localhost:8081
  plugins:
  - name: http_log
  routes:
  - paths: [/payments]
    methods: [POST]
- name: posts
  url: http://localhost:8082
  routes:
  - paths: ['/posts/{id}']
    methods: [GET]
";

    const UNKNOWN_PLUGIN: &str = "
services:
- name: orders
  url: http://localhost:8083
  plugins:
  - name: rate_limiting
  routes:
  - paths: [/orders]
    methods: [GET]
";

    fn builder() -> PipelineBuilder {
        let forwarder = Forwarder::new(&UpstreamConfig::default(), &TimeoutConfig::default()).unwrap();
        PipelineBuilder::new(Arc::new(PluginRegistry::with_builtins()), Arc::new(forwarder))
    }

    fn config(yaml: &str) -> Configuration {
        Configuration::from_yaml(yaml.as_bytes(), SystemTime::now()).unwrap()
    }

    #[test]
    fn test_one_chain_per_service() {
        let snapshot = builder().build(config(TWO_SERVICES)).unwrap();
        assert_eq!(snapshot.config().services().len(), 2);
        assert!(snapshot.chain(0).is_some());
        assert!(snapshot.chain(1).is_some());
        assert!(snapshot.chain(2).is_none());
    }

    #[test]
    fn test_resolve() {
        let snapshot = builder().build(config(TWO_SERVICES)).unwrap();

        let (matched, _) = snapshot.resolve("GET", "/posts/7").unwrap();
        assert_eq!(matched.index, 1);
        assert_eq!(matched.service.name, "posts");

        assert!(snapshot.resolve("GET", "/payments").is_none());
        assert!(Snapshot::empty().resolve("GET", "/").is_none());
    }

    #[test]
    fn test_unknown_plugin_names_service() {
        let err = builder().build(config(UNKNOWN_PLUGIN)).unwrap_err();
        assert_eq!(err.service, "orders");
        assert_eq!(err.source, PluginError::NotFound("rate_limiting".into()));
    }

    #[test]
    fn test_rejected_configuration_keeps_live_snapshot() {
        let live = Arc::new(ArcSwap::from_pointee(Snapshot::empty()));
        let publisher = SnapshotPublisher::new(live.clone(), builder());

        publisher.publish(config(TWO_SERVICES)).unwrap();
        assert_eq!(live.load().config().services().len(), 2);

        assert!(publisher.publish(config(UNKNOWN_PLUGIN)).is_err());
        assert_eq!(live.load().config().services()[0].name, "payments");
    }
}
