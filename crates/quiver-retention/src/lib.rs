//! Quiver Retention - Namespace retention metadata for the Quiver client
//!
//! This crate provides:
//! - Per-namespace retention options (retention period, block size, write
//!   buffers into the past and future)
//! - A namespace registry consulted on every write
//! - The write-window check that rejects out-of-retention timestamps before
//!   a write is routed

pub mod error;
pub mod namespace;

pub use error::{Result, RetentionError};
pub use namespace::{NamespaceConfig, NamespaceMetadata, NamespaceRegistry, RetentionOptions, WriteWindow};
