//! Key-value membership feed
//!
//! The dynamic resolver consumes cluster membership through this interface:
//! a point read plus a change subscription per key. Values are opaque,
//! versioned byte strings. External configuration services implement
//! `KvStore`; `MemStore` is the in-process implementation used by
//! single-process deployments and tests.

use crate::error::{ClusterError, Result};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

/// A value together with the version it was written at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedValue {
    pub version: u64,
    pub data: Vec<u8>,
}

/// Latest observed state of a watched key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KvEvent {
    /// Key has no value (never written or deleted)
    Missing,
    /// Key holds a value
    Value(Arc<VersionedValue>),
    /// Feed cannot currently serve the key
    Unavailable(String),
}

/// Key-value read and change-subscription interface
pub trait KvStore: Send + Sync {
    /// Read the current value of a key
    fn get(&self, key: &str) -> Result<Option<Arc<VersionedValue>>>;

    /// Subscribe to changes of a key. The receiver starts at the current
    /// state of the key.
    fn watch(&self, key: &str) -> Result<watch::Receiver<KvEvent>>;
}

/// In-memory key-value store
#[derive(Debug, Default)]
pub struct MemStore {
    keys: DashMap<String, watch::Sender<KvEvent>>,
}

impl MemStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a value, returning its new version
    pub fn set(&self, key: &str, data: Vec<u8>) -> u64 {
        let entry = self
            .keys
            .entry(key.to_string())
            .or_insert_with(|| watch::channel(KvEvent::Missing).0);

        let version = match &*entry.borrow() {
            KvEvent::Value(v) => v.version + 1,
            _ => 1,
        };
        entry.send_replace(KvEvent::Value(Arc::new(VersionedValue { version, data })));
        debug!(key, version, "kv value set");
        version
    }

    /// Delete a key's value
    pub fn delete(&self, key: &str) {
        if let Some(entry) = self.keys.get(key) {
            entry.send_replace(KvEvent::Missing);
        }
    }

    /// Mark a key as unavailable, as a remote store would on lost connectivity
    pub fn set_unavailable(&self, key: &str, reason: impl Into<String>) {
        let entry = self
            .keys
            .entry(key.to_string())
            .or_insert_with(|| watch::channel(KvEvent::Missing).0);
        entry.send_replace(KvEvent::Unavailable(reason.into()));
    }
}

impl KvStore for MemStore {
    fn get(&self, key: &str) -> Result<Option<Arc<VersionedValue>>> {
        let Some(entry) = self.keys.get(key) else {
            return Ok(None);
        };
        let event = entry.borrow();
        match &*event {
            KvEvent::Missing => Ok(None),
            KvEvent::Value(v) => Ok(Some(Arc::clone(v))),
            KvEvent::Unavailable(reason) => Err(ClusterError::FeedUnavailable(reason.clone())),
        }
    }

    fn watch(&self, key: &str) -> Result<watch::Receiver<KvEvent>> {
        let entry = self
            .keys
            .entry(key.to_string())
            .or_insert_with(|| watch::channel(KvEvent::Missing).0);
        Ok(entry.subscribe())
    }
}
