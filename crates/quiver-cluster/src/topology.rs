//! Topology snapshots
//!
//! A `Topology` is an immutable point-in-time mapping from shard number to
//! the ordered list of replica hosts that own it, plus each host's state for
//! that shard. Resolvers publish a new snapshot wholesale on every change;
//! holders of an older `Arc<Topology>` keep seeing the old mapping.

use crate::error::{ClusterError, Result};
use crate::shard::{ShardHasher, ShardId, ShardState};
use quiver_core::SeriesIdentity;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A storage host
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Host {
    /// Host identifier
    pub id: String,
    /// Network address (host:port)
    pub address: String,
}

impl Host {
    /// Create a new host
    pub fn new(id: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            address: address.into(),
        }
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.address)
    }
}

/// One replica of a shard: the host and its state for that shard
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replica {
    pub host: Arc<Host>,
    pub state: ShardState,
}

/// Which shard states make a host eligible as a write target.
///
/// `Available` is always eligible and `Unknown` never is. The default admits
/// `Initializing` hosts (so a shard being moved receives new writes on both
/// sides) and excludes `Leaving` ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriteTargetPolicy {
    pub include_initializing: bool,
    pub include_leaving: bool,
}

impl Default for WriteTargetPolicy {
    fn default() -> Self {
        Self {
            include_initializing: true,
            include_leaving: false,
        }
    }
}

impl WriteTargetPolicy {
    /// Check if a host in `state` should receive new writes
    pub fn is_eligible(&self, state: ShardState) -> bool {
        match state {
            ShardState::Available => true,
            ShardState::Initializing => self.include_initializing,
            ShardState::Leaving => self.include_leaving,
            ShardState::Unknown => false,
        }
    }
}

/// Immutable topology snapshot
#[derive(Debug, Clone)]
pub struct Topology {
    version: u64,
    num_shards: u32,
    replication_factor: usize,
    hasher: ShardHasher,
    hosts: Vec<Arc<Host>>,
    shards: Vec<Vec<Replica>>,
}

impl Topology {
    /// Create a builder for a topology with `num_shards` shards
    pub fn builder(num_shards: u32, hasher: ShardHasher) -> TopologyBuilder {
        TopologyBuilder::new(num_shards, hasher)
    }

    /// Version of the source this snapshot was built from
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Total number of shards
    pub fn num_shards(&self) -> u32 {
        self.num_shards
    }

    /// Configured replication factor
    pub fn replication_factor(&self) -> usize {
        self.replication_factor
    }

    /// Hash function used for routing
    pub fn hasher(&self) -> ShardHasher {
        self.hasher
    }

    /// All hosts, in first-seen order
    pub fn hosts(&self) -> &[Arc<Host>] {
        &self.hosts
    }

    /// Compute the shard owning a series
    pub fn shard_for(&self, series: &SeriesIdentity) -> ShardId {
        self.hasher.shard_for(series.id(), self.num_shards)
    }

    /// Ordered replicas of a shard (empty for out-of-range shards)
    pub fn replicas(&self, shard: ShardId) -> &[Replica] {
        self.shards
            .get(shard as usize)
            .map(|r| r.as_slice())
            .unwrap_or(&[])
    }

    /// Replicas of a shard eligible for new writes under `policy`
    pub fn write_targets(
        &self,
        shard: ShardId,
        policy: WriteTargetPolicy,
    ) -> impl Iterator<Item = &Replica> + '_ {
        self.replicas(shard)
            .iter()
            .filter(move |r| policy.is_eligible(r.state))
    }

    /// Shards a host holds, with its state for each
    pub fn shards_for_host(&self, host_id: &str) -> Vec<(ShardId, ShardState)> {
        self.shards
            .iter()
            .enumerate()
            .filter_map(|(shard, replicas)| {
                replicas
                    .iter()
                    .find(|r| r.host.id == host_id)
                    .map(|r| (shard as ShardId, r.state))
            })
            .collect()
    }
}

/// Builder for topology snapshots
pub struct TopologyBuilder {
    version: u64,
    num_shards: u32,
    replication_factor: usize,
    hasher: ShardHasher,
    hosts: Vec<Arc<Host>>,
    host_index: HashMap<String, usize>,
    assignments: Vec<(ShardId, usize, ShardState)>,
}

impl TopologyBuilder {
    /// Create a new builder
    pub fn new(num_shards: u32, hasher: ShardHasher) -> Self {
        Self {
            version: 0,
            num_shards,
            replication_factor: 1,
            hasher,
            hosts: Vec::new(),
            host_index: HashMap::new(),
            assignments: Vec::new(),
        }
    }

    /// Set the snapshot version
    pub fn version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    /// Set the replication factor
    pub fn replication_factor(mut self, replication_factor: usize) -> Self {
        self.replication_factor = replication_factor;
        self
    }

    /// Assign a shard to a host. Replica order follows assignment order.
    pub fn assign(mut self, shard: ShardId, host: &Host, state: ShardState) -> Self {
        let idx = match self.host_index.get(&host.id) {
            Some(&idx) => idx,
            None => {
                self.hosts.push(Arc::new(host.clone()));
                self.host_index.insert(host.id.clone(), self.hosts.len() - 1);
                self.hosts.len() - 1
            }
        };
        self.assignments.push((shard, idx, state));
        self
    }

    /// Assign every shard to a host
    pub fn assign_all(mut self, host: &Host, state: ShardState) -> Self {
        for shard in 0..self.num_shards {
            self = self.assign(shard, host, state);
        }
        self
    }

    /// Build the snapshot
    pub fn build(self) -> Result<Topology> {
        if self.num_shards == 0 {
            return Err(ClusterError::InvalidTopology(
                "shard count must be positive".to_string(),
            ));
        }
        if self.replication_factor == 0 {
            return Err(ClusterError::InvalidTopology(
                "replication factor must be positive".to_string(),
            ));
        }

        let mut shards: Vec<Vec<Replica>> = vec![Vec::new(); self.num_shards as usize];
        for (shard, idx, state) in self.assignments {
            if shard >= self.num_shards {
                return Err(ClusterError::ShardOutOfRange {
                    shard,
                    num_shards: self.num_shards,
                });
            }
            let host = &self.hosts[idx];
            let replicas = &mut shards[shard as usize];
            if replicas.iter().any(|r| r.host.id == host.id) {
                return Err(ClusterError::InvalidTopology(format!(
                    "shard {} assigned to host '{}' more than once",
                    shard, host.id
                )));
            }
            replicas.push(Replica {
                host: Arc::clone(host),
                state,
            });
        }

        for (shard, replicas) in shards.iter().enumerate() {
            let settled = replicas.iter().filter(|r| !r.state.is_transitional()).count();
            if settled > self.replication_factor {
                return Err(ClusterError::InvalidTopology(format!(
                    "shard {} has {} settled replicas, more than replication factor {}",
                    shard, settled, self.replication_factor
                )));
            }
        }

        Ok(Topology {
            version: self.version,
            num_shards: self.num_shards,
            replication_factor: self.replication_factor,
            hasher: self.hasher,
            hosts: self.hosts,
            shards,
        })
    }
}
