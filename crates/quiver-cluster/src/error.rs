//! Cluster error types

use std::time::Duration;
use thiserror::Error;

/// Cluster errors
#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid topology: {0}")]
    InvalidTopology(String),

    #[error("Shard {shard} out of range for {num_shards} shards")]
    ShardOutOfRange { shard: u32, num_shards: u32 },

    #[error("Failed to decode topology: {0}")]
    Decode(String),

    #[error("Failed to encode topology: {0}")]
    Encode(String),

    #[error("Membership feed unavailable: {0}")]
    FeedUnavailable(String),

    #[error("Timed out after {timeout:?} waiting for initial topology at key '{key}'")]
    InitTimeout { key: String, timeout: Duration },
}

/// Result type for cluster operations
pub type Result<T> = std::result::Result<T, ClusterError>;

impl From<serde_json::Error> for ClusterError {
    fn from(e: serde_json::Error) -> Self {
        ClusterError::Decode(e.to_string())
    }
}
