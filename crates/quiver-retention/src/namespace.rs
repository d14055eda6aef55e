//! Namespace metadata and write-window enforcement

use crate::error::{Result, RetentionError};
use parking_lot::RwLock;
use quiver_core::time::{duration_nanos, duration_str};
use quiver_core::{NamespaceId, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Retention options of a namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionOptions {
    /// How long data is kept
    #[serde(with = "duration_str")]
    pub retention_period: Duration,
    /// Size of a storage block
    #[serde(with = "duration_str")]
    pub block_size: Duration,
    /// How far into the past writes are accepted
    #[serde(with = "duration_str")]
    pub buffer_past: Duration,
    /// How far into the future writes are accepted
    #[serde(with = "duration_str")]
    pub buffer_future: Duration,
}

impl Default for RetentionOptions {
    fn default() -> Self {
        Self {
            retention_period: Duration::from_secs(2 * 24 * 3600),
            block_size: Duration::from_secs(2 * 3600),
            buffer_past: Duration::from_secs(10 * 60),
            buffer_future: Duration::from_secs(2 * 60),
        }
    }
}

/// Accepted timestamp range `[earliest, latest]`, inclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteWindow {
    pub earliest: Timestamp,
    pub latest: Timestamp,
}

impl WriteWindow {
    /// Check if a timestamp falls within this window
    pub fn contains(&self, ts: Timestamp) -> bool {
        ts >= self.earliest && ts <= self.latest
    }
}

impl RetentionOptions {
    /// Validate the options
    pub fn validate(&self) -> Result<()> {
        if self.block_size.is_zero() {
            return Err(RetentionError::InvalidOptions(
                "block size must be positive".to_string(),
            ));
        }
        if self.retention_period < self.block_size {
            return Err(RetentionError::InvalidOptions(format!(
                "retention period {:?} shorter than block size {:?}",
                self.retention_period, self.block_size
            )));
        }
        if self.buffer_past >= self.block_size {
            return Err(RetentionError::InvalidOptions(format!(
                "buffer past {:?} must be smaller than block size {:?}",
                self.buffer_past, self.block_size
            )));
        }
        if self.buffer_future >= self.block_size {
            return Err(RetentionError::InvalidOptions(format!(
                "buffer future {:?} must be smaller than block size {:?}",
                self.buffer_future, self.block_size
            )));
        }
        Ok(())
    }

    /// Window of timestamps accepted at `now`
    pub fn write_window(&self, now: Timestamp) -> WriteWindow {
        WriteWindow {
            earliest: now.saturating_sub(duration_nanos(self.buffer_past)),
            latest: now.saturating_add(duration_nanos(self.buffer_future)),
        }
    }
}

/// Namespace definition from configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamespaceConfig {
    /// Namespace name
    pub name: String,
    /// Retention options (required)
    #[serde(default)]
    pub retention: Option<RetentionOptions>,
}

/// Metadata of a registered namespace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceMetadata {
    id: NamespaceId,
    retention: RetentionOptions,
}

impl NamespaceMetadata {
    /// Create validated namespace metadata
    pub fn new(id: impl Into<NamespaceId>, retention: RetentionOptions) -> Result<Self> {
        let id = id.into();
        if id.as_str().is_empty() {
            return Err(RetentionError::InvalidOptions(
                "namespace name must not be empty".to_string(),
            ));
        }
        retention.validate()?;
        Ok(Self { id, retention })
    }

    /// Build from a configuration entry
    pub fn from_config(config: &NamespaceConfig) -> Result<Self> {
        let retention = config.retention.ok_or_else(|| {
            RetentionError::InvalidOptions(format!(
                "namespace '{}' retention options cannot be empty",
                config.name
            ))
        })?;
        Self::new(config.name.as_str(), retention)
    }

    /// Namespace ID
    pub fn id(&self) -> &NamespaceId {
        &self.id
    }

    /// Retention options
    pub fn retention(&self) -> &RetentionOptions {
        &self.retention
    }

    /// Check that a write at `timestamp` is accepted at `now`
    pub fn check_write(&self, timestamp: Timestamp, now: Timestamp) -> Result<()> {
        let window = self.retention.write_window(now);
        if !window.contains(timestamp) {
            return Err(RetentionError::OutOfWindow {
                namespace: self.id.to_string(),
                timestamp,
                earliest: window.earliest,
                latest: window.latest,
            });
        }
        Ok(())
    }
}

/// Registry of namespaces known to the client
#[derive(Debug, Default)]
pub struct NamespaceRegistry {
    namespaces: RwLock<HashMap<NamespaceId, Arc<NamespaceMetadata>>>,
}

impl NamespaceRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from configuration entries
    pub fn from_configs(configs: &[NamespaceConfig]) -> Result<Self> {
        let registry = Self::new();
        for config in configs {
            registry.register(NamespaceMetadata::from_config(config)?);
        }
        Ok(registry)
    }

    /// Register or replace a namespace
    pub fn register(&self, metadata: NamespaceMetadata) {
        info!(
            namespace = %metadata.id,
            buffer_past = ?metadata.retention.buffer_past,
            buffer_future = ?metadata.retention.buffer_future,
            "namespace registered"
        );
        self.namespaces
            .write()
            .insert(metadata.id.clone(), Arc::new(metadata));
    }

    /// Remove a namespace
    pub fn remove(&self, id: &NamespaceId) -> Option<Arc<NamespaceMetadata>> {
        self.namespaces.write().remove(id)
    }

    /// Get a namespace
    pub fn get(&self, id: &NamespaceId) -> Option<Arc<NamespaceMetadata>> {
        self.namespaces.read().get(id).cloned()
    }

    /// List all namespaces
    pub fn list(&self) -> Vec<Arc<NamespaceMetadata>> {
        self.namespaces.read().values().cloned().collect()
    }

    /// Check a write against its namespace's write window
    pub fn check_write(&self, id: &NamespaceId, timestamp: Timestamp, now: Timestamp) -> Result<()> {
        let namespaces = self.namespaces.read();
        let metadata = namespaces
            .get(id)
            .ok_or_else(|| RetentionError::NamespaceNotFound(id.to_string()))?;
        metadata.check_write(timestamp, now)
    }
}
