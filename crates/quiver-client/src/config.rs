//! Client configuration
//!
//! Example:
//!
//! ```yaml
//! topology:
//!   static:
//!     shards: 64
//!     hosts:
//!       - id: node1
//!         address: 127.0.0.1:9000
//! hashing:
//!   algorithm: xxh3
//!   seed: 0
//! namespaces:
//!   - name: metrics
//!     retention:
//!       retention_period: 48h
//!       block_size: 2h
//!       buffer_past: 10m
//!       buffer_future: 2m
//! write:
//!   consistency: majority
//!   timeout: 10s
//! ```

use crate::error::{ClientError, Result};
use crate::session::{WriteOptions, WriteSession};
use crate::transport::HostTransport;
use quiver_cluster::{HashConfig, KvStore, TopologyConfig, TopologyResolver};
use quiver_retention::{NamespaceConfig, NamespaceMetadata, NamespaceRegistry};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

/// Complete client configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Cluster placement source
    pub topology: TopologyConfig,
    /// Shard hash function, fixed for the cluster lifetime
    pub hashing: HashConfig,
    /// Namespaces accepting writes
    pub namespaces: Vec<NamespaceConfig>,
    /// Write path options
    pub write: WriteOptions,
}

impl ClientConfig {
    /// Load configuration from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse and validate configuration from a YAML string
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: ClientConfig = serde_yaml::from_str(content)
            .map_err(|e| ClientError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate every section
    pub fn validate(&self) -> Result<()> {
        self.topology.validate()?;
        self.write.validate()?;

        let mut seen = HashSet::new();
        for namespace in &self.namespaces {
            NamespaceMetadata::from_config(namespace)?;
            if !seen.insert(namespace.name.as_str()) {
                return Err(ClientError::Config(format!(
                    "namespace '{}' defined more than once",
                    namespace.name
                )));
            }
        }
        Ok(())
    }

    /// Build the namespace registry
    pub fn namespace_registry(&self) -> Result<NamespaceRegistry> {
        Ok(NamespaceRegistry::from_configs(&self.namespaces)?)
    }

    /// Build the topology resolver. `kv` is required for dynamic topologies.
    pub async fn build_resolver(
        &self,
        kv: Option<Arc<dyn KvStore>>,
    ) -> Result<Arc<dyn TopologyResolver>> {
        Ok(self.topology.build_resolver(self.hashing, kv).await?)
    }

    /// Build a write session from this configuration
    pub async fn connect(
        &self,
        transport: Arc<dyn HostTransport>,
        kv: Option<Arc<dyn KvStore>>,
    ) -> Result<WriteSession> {
        self.validate()?;
        let namespaces = Arc::new(self.namespace_registry()?);
        let resolver = self.build_resolver(kv).await?;
        WriteSession::new(resolver, namespaces, transport, self.write.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consistency::ConsistencyLevel;
    use quiver_cluster::HashAlgorithm;
    use std::time::Duration;

    const CONFIG: &str = r#"
topology:
  static:
    shards: 16
    replicas: 2
    hosts:
      - id: node1
        address: 10.0.1.1:9000
      - id: node2
        address: 10.0.1.2:9000
hashing:
  algorithm: fx
  seed: 42
namespaces:
  - name: metrics
    retention:
      retention_period: 48h
      block_size: 2h
      buffer_past: 10m
      buffer_future: 2m
write:
  consistency: one
  timeout: 5s
  pool_size: 128
"#;

    #[test]
    fn test_parse_config() {
        let config = ClientConfig::from_yaml(CONFIG).unwrap();
        assert_eq!(config.hashing.algorithm, HashAlgorithm::Fx);
        assert_eq!(config.hashing.seed, 42);
        assert_eq!(config.namespaces.len(), 1);
        assert_eq!(config.write.consistency, ConsistencyLevel::One);
        assert_eq!(config.write.timeout, Duration::from_secs(5));
        assert_eq!(config.write.pool_size, 128);
        assert_eq!(config.write.host_queue_size, 1024);
        assert_eq!(config.topology.static_config.unwrap().hosts.len(), 2);
    }

    #[test]
    fn test_missing_topology_rejected() {
        assert!(ClientConfig::from_yaml("namespaces: []").is_err());
    }

    #[test]
    fn test_namespace_without_retention_rejected() {
        let yaml = r#"
topology:
  static:
    hosts:
      - id: node1
        address: 127.0.0.1:9000
namespaces:
  - name: metrics
"#;
        assert!(matches!(
            ClientConfig::from_yaml(yaml),
            Err(ClientError::Retention(_))
        ));
    }

    #[test]
    fn test_duplicate_namespace_rejected() {
        let mut config = ClientConfig::from_yaml(CONFIG).unwrap();
        config.namespaces.push(config.namespaces[0].clone());
        assert!(matches!(config.validate(), Err(ClientError::Config(_))));
    }

    #[tokio::test]
    async fn test_build_resolver_uses_hashing() {
        let config = ClientConfig::from_yaml(CONFIG).unwrap();
        let topology = config.build_resolver(None).await.unwrap().resolve();
        assert_eq!(topology.num_shards(), 16);
        assert_eq!(topology.replication_factor(), 2);
        assert_eq!(topology.hasher().config(), config.hashing);
    }
}
