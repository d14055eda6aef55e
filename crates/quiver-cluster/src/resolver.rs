//! Topology resolvers
//!
//! A resolver owns the current topology snapshot and publishes replacements.
//! Readers take an `Arc<Topology>` and never hold a lock while using it, so a
//! write keeps routing against the snapshot it captured even if a newer one
//! is published mid-flight.

use crate::error::{ClusterError, Result};
use crate::shard::{HashConfig, ShardHasher, ShardState};
use crate::topology::{Host, Topology};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

/// Subscription to topology snapshots
pub type TopologyWatch = watch::Receiver<Arc<Topology>>;

/// Source of topology snapshots
pub trait TopologyResolver: Send + Sync {
    /// Current snapshot
    fn resolve(&self) -> Arc<Topology>;

    /// Subscribe to snapshots. The current snapshot is delivered first: the
    /// first `changed().await` on the returned receiver completes
    /// immediately.
    fn subscribe(&self) -> TopologyWatch;

    /// True while the resolver is serving a last-known-good snapshot because
    /// its source is unavailable or invalid
    fn is_stale(&self) -> bool {
        false
    }

    /// Stop background work. Snapshots stay readable.
    fn close(&self) {}
}

/// Options for a static topology
#[derive(Debug, Clone)]
pub struct StaticOptions {
    /// Total number of shards
    pub num_shards: u32,
    /// Replication factor
    pub replicas: usize,
    /// Hosts owning every shard
    pub hosts: Vec<Host>,
    /// Hash function
    pub hash: HashConfig,
}

impl StaticOptions {
    /// Single host owning every shard, replication factor 1
    pub fn single_host(num_shards: u32, host: Host) -> Self {
        Self {
            num_shards,
            replicas: 1,
            hosts: vec![host],
            hash: HashConfig::default(),
        }
    }

    /// Build the snapshot: every shard maps to the same host set, all
    /// `Available`.
    pub fn to_topology(&self) -> Result<Topology> {
        if self.hosts.is_empty() {
            return Err(ClusterError::Configuration(
                "static topology requires at least one host".to_string(),
            ));
        }
        if self.replicas != self.hosts.len() {
            return Err(ClusterError::Configuration(format!(
                "static topology replicates every shard to all {} hosts, but replicas is {}",
                self.hosts.len(),
                self.replicas
            )));
        }

        let mut builder = Topology::builder(self.num_shards, ShardHasher::new(self.hash))
            .replication_factor(self.replicas);
        for host in &self.hosts {
            builder = builder.assign_all(host, ShardState::Available);
        }
        builder.build()
    }
}

/// Resolver for a topology fixed at startup
#[derive(Debug)]
pub struct StaticResolver {
    tx: watch::Sender<Arc<Topology>>,
}

impl StaticResolver {
    /// Build from static options
    pub fn new(options: &StaticOptions) -> Result<Self> {
        let topology = options.to_topology()?;
        info!(
            num_shards = topology.num_shards(),
            replicas = topology.replication_factor(),
            hosts = topology.hosts().len(),
            "static topology initialized"
        );
        Ok(Self::from_topology(topology))
    }

    /// Serve a prebuilt snapshot
    pub fn from_topology(topology: Topology) -> Self {
        let (tx, _) = watch::channel(Arc::new(topology));
        Self { tx }
    }
}

impl TopologyResolver for StaticResolver {
    fn resolve(&self) -> Arc<Topology> {
        self.tx.borrow().clone()
    }

    fn subscribe(&self) -> TopologyWatch {
        let mut rx = self.tx.subscribe();
        rx.mark_changed();
        rx
    }
}
