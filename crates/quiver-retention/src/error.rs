//! Retention error types

use quiver_core::Timestamp;
use thiserror::Error;

/// Retention errors
#[derive(Debug, Clone, Error)]
pub enum RetentionError {
    #[error("Namespace not found: {0}")]
    NamespaceNotFound(String),

    #[error("Invalid retention options: {0}")]
    InvalidOptions(String),

    #[error("Timestamp {timestamp} outside write window [{earliest}, {latest}] of namespace {namespace}")]
    OutOfWindow {
        namespace: String,
        timestamp: Timestamp,
        earliest: Timestamp,
        latest: Timestamp,
    },
}

/// Result type for retention operations
pub type Result<T> = std::result::Result<T, RetentionError>;
