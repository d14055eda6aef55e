//! Topology configuration
//!
//! The `topology` section selects how the client learns cluster placement:
//! - `static`: a fixed shard count and host list, for single-node or
//!   manually managed deployments
//! - `dynamic`: a key on the membership feed holding the placement document
//!
//! Exactly one of the two must be present.

use crate::dynamic::{DynamicOptions, DynamicResolver, DEFAULT_TOPOLOGY_KEY};
use crate::error::{ClusterError, Result};
use crate::kv::KvStore;
use crate::resolver::{StaticOptions, StaticResolver, TopologyResolver};
use crate::shard::HashConfig;
use crate::topology::Host;
use quiver_core::time::duration_str;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Topology section of the client configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TopologyConfig {
    /// Fixed placement
    #[serde(rename = "static", default, skip_serializing_if = "Option::is_none")]
    pub static_config: Option<StaticTopologyConfig>,
    /// Placement from the membership feed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dynamic: Option<DynamicTopologyConfig>,
}

/// Static placement: every shard on every listed host
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticTopologyConfig {
    /// Total number of shards
    #[serde(default = "default_shard_count")]
    pub shards: u32,
    /// Replication factor, must equal the number of hosts
    #[serde(default = "default_replicas")]
    pub replicas: usize,
    /// Hosts
    pub hosts: Vec<HostConfig>,
}

fn default_shard_count() -> u32 {
    64
}

fn default_replicas() -> usize {
    1
}

/// Dynamic placement source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DynamicTopologyConfig {
    /// Feed key holding the placement document
    #[serde(default = "default_key")]
    pub key: String,
    /// How long to wait for the first placement at startup
    #[serde(default = "default_init_timeout", with = "duration_str")]
    pub init_timeout: Duration,
}

fn default_key() -> String {
    DEFAULT_TOPOLOGY_KEY.to_string()
}

fn default_init_timeout() -> Duration {
    Duration::from_secs(30)
}

/// Configuration for a single host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostConfig {
    /// Host identifier
    pub id: String,
    /// Host address (host:port)
    pub address: String,
}

impl HostConfig {
    /// Create a new host configuration
    pub fn new(id: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            address: address.into(),
        }
    }
}

impl From<&HostConfig> for Host {
    fn from(config: &HostConfig) -> Self {
        Host::new(config.id.clone(), config.address.clone())
    }
}

impl TopologyConfig {
    /// Static single-host placement (for standalone mode)
    pub fn single_host(id: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            static_config: Some(StaticTopologyConfig {
                shards: default_shard_count(),
                replicas: 1,
                hosts: vec![HostConfig::new(id, address)],
            }),
            dynamic: None,
        }
    }

    /// Dynamic placement read from `key`
    pub fn dynamic(key: impl Into<String>) -> Self {
        Self {
            static_config: None,
            dynamic: Some(DynamicTopologyConfig {
                key: key.into(),
                init_timeout: default_init_timeout(),
            }),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        match (&self.static_config, &self.dynamic) {
            (Some(_), Some(_)) => Err(ClusterError::Configuration(
                "topology must be either static or dynamic, not both".to_string(),
            )),
            (None, None) => Err(ClusterError::Configuration(
                "dynamic or static topology configuration required".to_string(),
            )),
            (Some(cfg), None) => cfg.validate(),
            (None, Some(cfg)) => {
                if cfg.key.is_empty() {
                    return Err(ClusterError::Configuration(
                        "dynamic topology key must not be empty".to_string(),
                    ));
                }
                Ok(())
            }
        }
    }

    /// Build the resolver this configuration selects.
    ///
    /// The dynamic variant needs the membership feed and waits for its first
    /// placement.
    pub async fn build_resolver(
        &self,
        hash: HashConfig,
        kv: Option<Arc<dyn KvStore>>,
    ) -> Result<Arc<dyn TopologyResolver>> {
        self.validate()?;

        if let Some(cfg) = &self.dynamic {
            info!(key = %cfg.key, "creating dynamic topology resolver");
            let store = kv.ok_or_else(|| {
                ClusterError::Configuration(
                    "dynamic topology requires a membership feed".to_string(),
                )
            })?;
            let options = DynamicOptions {
                key: cfg.key.clone(),
                init_timeout: cfg.init_timeout,
                hash,
            };
            return Ok(Arc::new(DynamicResolver::connect(store, options).await?));
        }

        match &self.static_config {
            Some(cfg) => {
                info!(shards = cfg.shards, hosts = cfg.hosts.len(), "creating static topology resolver");
                Ok(Arc::new(StaticResolver::new(&cfg.to_options(hash))?))
            }
            None => Err(ClusterError::Configuration(
                "dynamic or static topology configuration required".to_string(),
            )),
        }
    }
}

impl StaticTopologyConfig {
    /// Convert to resolver options
    pub fn to_options(&self, hash: HashConfig) -> StaticOptions {
        StaticOptions {
            num_shards: self.shards,
            replicas: self.replicas,
            hosts: self.hosts.iter().map(Host::from).collect(),
            hash,
        }
    }

    /// Validate the static placement
    pub fn validate(&self) -> Result<()> {
        if self.shards == 0 {
            return Err(ClusterError::Configuration(
                "shard count must be positive".to_string(),
            ));
        }
        if self.hosts.is_empty() {
            return Err(ClusterError::Configuration(
                "static topology requires at least one host".to_string(),
            ));
        }
        if self.replicas > self.hosts.len() {
            return Err(ClusterError::Configuration(format!(
                "Replication factor {} exceeds host count {}",
                self.replicas,
                self.hosts.len()
            )));
        }
        if self.replicas != self.hosts.len() {
            return Err(ClusterError::Configuration(format!(
                "static topology replicates every shard to all hosts; set replicas to {}",
                self.hosts.len()
            )));
        }

        let mut ids: Vec<&str> = self.hosts.iter().map(|h| h.id.as_str()).collect();
        ids.sort_unstable();
        if let Some(dup) = ids.windows(2).find(|w| w[0] == w[1]) {
            return Err(ClusterError::Configuration(format!(
                "host '{}' listed more than once",
                dup[0]
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemStore;

    #[test]
    fn test_single_host_config() {
        let config = TopologyConfig::single_host("node1", "127.0.0.1:9000");
        assert!(config.validate().is_ok());
        let static_config = config.static_config.unwrap();
        assert_eq!(static_config.shards, 64);
        assert_eq!(static_config.replicas, 1);
    }

    #[test]
    fn test_parse_static_yaml() {
        let yaml = r#"
static:
  shards: 4
  replicas: 2
  hosts:
    - id: node1
      address: 10.0.1.1:9000
    - id: node2
      address: 10.0.1.2:9000
"#;
        let config: TopologyConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_ok());
        let options = config.static_config.unwrap().to_options(HashConfig::default());
        assert_eq!(options.num_shards, 4);
        assert_eq!(options.hosts[1], Host::new("node2", "10.0.1.2:9000"));
    }

    #[test]
    fn test_parse_dynamic_yaml_defaults() {
        let config: TopologyConfig = serde_yaml::from_str("dynamic: {}").unwrap();
        let dynamic = config.dynamic.clone().unwrap();
        assert_eq!(dynamic.key, DEFAULT_TOPOLOGY_KEY);
        assert_eq!(dynamic.init_timeout, Duration::from_secs(30));

        let config: TopologyConfig =
            serde_yaml::from_str("dynamic:\n  key: placement\n  init_timeout: 5s\n").unwrap();
        let dynamic = config.dynamic.unwrap();
        assert_eq!(dynamic.key, "placement");
        assert_eq!(dynamic.init_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_validation() {
        assert!(TopologyConfig::default().validate().is_err());

        let mut both = TopologyConfig::single_host("a", "a:1");
        both.dynamic = TopologyConfig::dynamic("placement").dynamic;
        assert!(both.validate().is_err());

        let mut cfg = StaticTopologyConfig {
            shards: 4,
            replicas: 3,
            hosts: vec![HostConfig::new("a", "a:1"), HostConfig::new("b", "b:1")],
        };
        assert!(cfg.validate().is_err());
        cfg.replicas = 1;
        assert!(cfg.validate().is_err());
        cfg.replicas = 2;
        assert!(cfg.validate().is_ok());
        cfg.hosts[1].id = "a".to_string();
        assert!(cfg.validate().is_err());
        cfg.hosts.clear();
        assert!(cfg.validate().is_err());
    }

    #[tokio::test]
    async fn test_build_static_resolver() {
        let config = TopologyConfig::single_host("node1", "127.0.0.1:9000");
        let resolver = config.build_resolver(HashConfig::default(), None).await.unwrap();
        assert_eq!(resolver.resolve().num_shards(), 64);
    }

    #[tokio::test]
    async fn test_build_dynamic_requires_feed() {
        let config = TopologyConfig::dynamic("placement");
        assert!(config.build_resolver(HashConfig::default(), None).await.is_err());
    }

    #[tokio::test]
    async fn test_build_dynamic_resolver() {
        use crate::descriptor::{InstanceDescriptor, ShardAssignment, TopologyDescriptor};
        use crate::shard::ShardState;

        let store = Arc::new(MemStore::new());
        let desc = TopologyDescriptor {
            num_shards: 2,
            replication_factor: 1,
            instances: vec![InstanceDescriptor {
                id: "a".into(),
                address: "a:1".into(),
                shards: vec![
                    ShardAssignment { id: 0, state: ShardState::Available },
                    ShardAssignment { id: 1, state: ShardState::Available },
                ],
            }],
        };
        store.set("placement", desc.encode().unwrap());

        let config = TopologyConfig::dynamic("placement");
        let resolver = config
            .build_resolver(HashConfig::default(), Some(store as Arc<dyn KvStore>))
            .await
            .unwrap();
        assert_eq!(resolver.resolve().num_shards(), 2);
        resolver.close();
    }
}
