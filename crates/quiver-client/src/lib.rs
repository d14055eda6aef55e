//! Quiver Client - Write dispatch for a sharded, replicated Quiver cluster
//!
//! This crate provides:
//! - Consistency levels and the aggregation of per-replica replies
//! - Pools of reusable write operations and aggregators, and a shared
//!   deadline timer
//! - Bounded per-host outbound queues over a pluggable transport
//! - `WriteSession`, which routes each datapoint to its shard's replicas
//! - YAML client configuration

pub mod aggregator;
pub mod config;
pub mod consistency;
pub mod deadline;
pub mod error;
pub mod op;
pub mod pool;
pub mod queue;
pub mod session;
pub mod stats;
pub mod transport;

pub use aggregator::{
    AggregatorPool, Completion, CompletionAggregator, CompletionFn, CompletionHandler,
};
pub use config::ClientConfig;
pub use consistency::{ConsistencyLevel, Decision, Tally};
pub use deadline::Deadlines;
pub use error::{ClientError, Result, TransportError, WriteError};
pub use op::WriteOp;
pub use pool::WriteOpPool;
pub use queue::HostQueues;
pub use session::{WriteOptions, WriteRequest, WriteSession};
pub use stats::{WriteStats, WriteStatsSnapshot};
pub use transport::HostTransport;
