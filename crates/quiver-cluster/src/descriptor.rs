//! Serialized topology descriptors
//!
//! The membership feed stores the placement as a JSON document listing each
//! instance and the shards it holds:
//!
//! ```json
//! {
//!   "num_shards": 3,
//!   "replication_factor": 2,
//!   "instances": [
//!     { "id": "hostA", "address": "10.0.1.1:9000",
//!       "shards": [ { "id": 0, "state": "Available" } ] }
//!   ]
//! }
//! ```
//!
//! Replica order for a shard follows instance order in the document.

use crate::error::{ClusterError, Result};
use crate::shard::{ShardHasher, ShardId, ShardState};
use crate::topology::{Host, Topology};
use serde::{Deserialize, Serialize};

/// Shard held by an instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardAssignment {
    pub id: ShardId,
    pub state: ShardState,
}

/// Cluster instance and its shard assignments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceDescriptor {
    pub id: String,
    pub address: String,
    #[serde(default)]
    pub shards: Vec<ShardAssignment>,
}

/// Placement document published on the membership feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyDescriptor {
    pub num_shards: u32,
    pub replication_factor: usize,
    pub instances: Vec<InstanceDescriptor>,
}

impl TopologyDescriptor {
    /// Decode a descriptor from feed bytes
    pub fn decode(data: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(data)?)
    }

    /// Encode for publication on the feed
    pub fn encode(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| ClusterError::Encode(e.to_string()))
    }

    /// Build a topology snapshot from this descriptor
    pub fn to_topology(&self, version: u64, hasher: ShardHasher) -> Result<Topology> {
        let mut builder = Topology::builder(self.num_shards, hasher)
            .version(version)
            .replication_factor(self.replication_factor);

        for instance in &self.instances {
            if instance.id.is_empty() {
                return Err(ClusterError::InvalidTopology(
                    "instance with empty id".to_string(),
                ));
            }
            let host = Host::new(instance.id.clone(), instance.address.clone());
            for shard in &instance.shards {
                builder = builder.assign(shard.id, &host, shard.state);
            }
        }

        builder.build()
    }
}
