//! Error types for quiver-core

use thiserror::Error;

/// Core error types
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Empty series id")]
    EmptySeriesId,

    #[error("Empty tag key")]
    EmptyTagKey,

    #[error("Duplicate tag key: {0}")]
    DuplicateTagKey(String),

    #[error("Invalid duration: {0}")]
    InvalidDuration(String),
}

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, CoreError>;
