//! Quiver Cluster - Shard routing and topology for the Quiver client
//!
//! This crate provides:
//! - Seeded shard hashing (series ID -> shard number)
//! - Immutable topology snapshots (shard -> ordered replica hosts)
//! - Topology resolvers: static (fixed at startup) and dynamic (driven by
//!   a key-value membership feed)
//! - An in-memory key-value store for deployments without a config service

pub mod config;
pub mod descriptor;
pub mod dynamic;
pub mod error;
pub mod kv;
pub mod resolver;
pub mod shard;
pub mod topology;

pub use config::{DynamicTopologyConfig, HostConfig, StaticTopologyConfig, TopologyConfig};
pub use descriptor::{InstanceDescriptor, ShardAssignment, TopologyDescriptor};
pub use dynamic::{DynamicOptions, DynamicResolver};
pub use error::{ClusterError, Result};
pub use kv::{KvEvent, KvStore, MemStore, VersionedValue};
pub use resolver::{StaticOptions, StaticResolver, TopologyResolver, TopologyWatch};
pub use shard::{HashAlgorithm, HashConfig, ShardHasher, ShardId, ShardState, UNASSIGNED_SHARD};
pub use topology::{Host, Replica, Topology, TopologyBuilder, WriteTargetPolicy};
