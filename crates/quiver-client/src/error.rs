//! Client error types

use crate::consistency::ConsistencyLevel;
use quiver_cluster::{ClusterError, ShardId};
use quiver_core::Timestamp;
use quiver_retention::RetentionError;
use std::time::Duration;
use thiserror::Error;

/// Failure of a single per-replica send
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Rejected by host: {0}")]
    Rejected(String),

    #[error("Host queue closed")]
    Closed,
}

/// Outcome of a failed logical write, as delivered to the caller
#[derive(Debug, Clone, Error)]
pub enum WriteError {
    #[error("No available replicas for shard {shard}")]
    NoAvailableReplicas { shard: ShardId },

    #[error("Timestamp {timestamp} outside write window [{earliest}, {latest}] of namespace {namespace}")]
    OutOfRetentionWindow {
        namespace: String,
        timestamp: Timestamp,
        earliest: Timestamp,
        latest: Timestamp,
    },

    #[error("Unknown namespace: {0}")]
    UnknownNamespace(String),

    #[error("Invalid namespace options: {0}")]
    InvalidNamespace(String),

    #[error("Consistency level {level} not reached: {successes} of {required} required acknowledgements")]
    ConsistencyNotReached {
        level: ConsistencyLevel,
        successes: usize,
        required: usize,
        #[source]
        cause: Option<TransportError>,
    },

    #[error("Write timed out after {after:?}: {successes} of {required} required acknowledgements")]
    Timeout {
        after: Duration,
        successes: usize,
        required: usize,
    },

    #[error("Write session closed")]
    Closed,
}

impl WriteError {
    /// True for failures decided before any replica was contacted
    pub fn is_rejection(&self) -> bool {
        match self {
            WriteError::NoAvailableReplicas { .. }
            | WriteError::OutOfRetentionWindow { .. }
            | WriteError::UnknownNamespace(_)
            | WriteError::InvalidNamespace(_)
            | WriteError::Closed => true,
            WriteError::ConsistencyNotReached { successes, cause, .. } => {
                *successes == 0 && cause.is_none()
            }
            WriteError::Timeout { .. } => false,
        }
    }
}

impl From<RetentionError> for WriteError {
    fn from(err: RetentionError) -> Self {
        match err {
            RetentionError::OutOfWindow {
                namespace,
                timestamp,
                earliest,
                latest,
            } => WriteError::OutOfRetentionWindow {
                namespace,
                timestamp,
                earliest,
                latest,
            },
            RetentionError::NamespaceNotFound(name) => WriteError::UnknownNamespace(name),
            RetentionError::InvalidOptions(msg) => WriteError::InvalidNamespace(msg),
        }
    }
}

/// Errors building or configuring a client
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Cluster error: {0}")]
    Cluster(#[from] ClusterError),

    #[error("Retention error: {0}")]
    Retention(#[from] RetentionError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for client setup
pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_consistency_error_carries_cause() {
        let err = WriteError::ConsistencyNotReached {
            level: ConsistencyLevel::All,
            successes: 1,
            required: 2,
            cause: Some(TransportError::Network("connection reset".to_string())),
        };
        assert_eq!(
            err.to_string(),
            "Consistency level all not reached: 1 of 2 required acknowledgements"
        );
        assert_eq!(
            err.source().map(|e| e.to_string()),
            Some("Network error: connection reset".to_string())
        );
        assert!(!err.is_rejection());
    }

    #[test]
    fn test_from_retention_error() {
        let err: WriteError = RetentionError::OutOfWindow {
            namespace: "metrics".to_string(),
            timestamp: 1,
            earliest: 10,
            latest: 20,
        }
        .into();
        assert!(matches!(err, WriteError::OutOfRetentionWindow { timestamp: 1, .. }));
        assert!(err.is_rejection());

        let err: WriteError = RetentionError::NamespaceNotFound("logs".to_string()).into();
        assert!(matches!(err, WriteError::UnknownNamespace(ref name) if name == "logs"));

        let err: WriteError =
            RetentionError::InvalidOptions("block size must be positive".to_string()).into();
        assert!(matches!(err, WriteError::InvalidNamespace(_)));
        assert_eq!(
            err.to_string(),
            "Invalid namespace options: block size must be positive"
        );
        assert!(err.is_rejection());
    }
}
