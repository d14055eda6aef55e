//! Dynamic topology resolver
//!
//! Watches a key on the membership feed, decodes each new value into a
//! topology snapshot and publishes it. When the feed is unavailable, or
//! publishes something that does not decode, the last good snapshot stays
//! in service and the resolver reports itself stale until a valid value
//! arrives.

use crate::descriptor::TopologyDescriptor;
use crate::error::{ClusterError, Result};
use crate::kv::{KvEvent, KvStore, VersionedValue};
use crate::resolver::{TopologyResolver, TopologyWatch};
use crate::shard::{HashConfig, ShardHasher};
use crate::topology::Topology;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Default key holding the placement document
pub const DEFAULT_TOPOLOGY_KEY: &str = "_placement";

/// Options for the dynamic resolver
#[derive(Debug, Clone)]
pub struct DynamicOptions {
    /// Feed key holding the serialized topology
    pub key: String,
    /// How long `connect` waits for the first valid topology
    pub init_timeout: Duration,
    /// Hash function (fixed for the cluster lifetime, not read from the feed)
    pub hash: HashConfig,
}

impl Default for DynamicOptions {
    fn default() -> Self {
        Self {
            key: DEFAULT_TOPOLOGY_KEY.to_string(),
            init_timeout: Duration::from_secs(30),
            hash: HashConfig::default(),
        }
    }
}

/// Resolver fed by a key-value membership feed
#[derive(Debug)]
pub struct DynamicResolver {
    key: String,
    tx: Arc<watch::Sender<Arc<Topology>>>,
    stale: Arc<AtomicBool>,
    cancel: CancellationToken,
}

impl DynamicResolver {
    /// Subscribe to the feed and wait for the first valid topology.
    ///
    /// Must be called within a Tokio runtime; the watch loop runs as a
    /// background task until `close` is called or the resolver is dropped.
    pub async fn connect(store: Arc<dyn KvStore>, options: DynamicOptions) -> Result<Self> {
        let hasher = ShardHasher::new(options.hash);
        let mut feed = store.watch(&options.key)?;

        let first = tokio::time::timeout(
            options.init_timeout,
            wait_for_topology(&mut feed, &options.key, hasher),
        )
        .await
        .map_err(|_| ClusterError::InitTimeout {
            key: options.key.clone(),
            timeout: options.init_timeout,
        })??;

        info!(
            key = %options.key,
            version = first.version(),
            num_shards = first.num_shards(),
            hosts = first.hosts().len(),
            "dynamic topology initialized"
        );

        let (tx, _) = watch::channel(Arc::new(first));
        let resolver = Self {
            key: options.key,
            tx: Arc::new(tx),
            stale: Arc::new(AtomicBool::new(false)),
            cancel: CancellationToken::new(),
        };

        let watcher = Watcher {
            key: resolver.key.clone(),
            hasher,
            tx: Arc::clone(&resolver.tx),
            stale: Arc::clone(&resolver.stale),
        };
        tokio::spawn(watcher.run(feed, resolver.cancel.clone()));

        Ok(resolver)
    }

    /// Feed key this resolver watches
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl TopologyResolver for DynamicResolver {
    fn resolve(&self) -> Arc<Topology> {
        self.tx.borrow().clone()
    }

    fn subscribe(&self) -> TopologyWatch {
        let mut rx = self.tx.subscribe();
        rx.mark_changed();
        rx
    }

    fn is_stale(&self) -> bool {
        self.stale.load(Ordering::Acquire)
    }

    fn close(&self) {
        self.cancel.cancel();
    }
}

impl Drop for DynamicResolver {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn wait_for_topology(
    feed: &mut watch::Receiver<KvEvent>,
    key: &str,
    hasher: ShardHasher,
) -> Result<Topology> {
    loop {
        let event = feed.borrow_and_update().clone();
        match event {
            KvEvent::Value(value) => match decode(&value, hasher) {
                Ok(topology) => return Ok(topology),
                Err(e) => warn!(key, version = value.version, error = %e, "ignoring invalid topology"),
            },
            KvEvent::Missing => debug!(key, "waiting for topology to be published"),
            KvEvent::Unavailable(reason) => warn!(key, %reason, "membership feed unavailable"),
        }

        feed.changed()
            .await
            .map_err(|_| ClusterError::FeedUnavailable(format!("watch on '{}' closed", key)))?;
    }
}

fn decode(value: &VersionedValue, hasher: ShardHasher) -> Result<Topology> {
    TopologyDescriptor::decode(&value.data)?.to_topology(value.version, hasher)
}

/// Background task applying feed updates
struct Watcher {
    key: String,
    hasher: ShardHasher,
    tx: Arc<watch::Sender<Arc<Topology>>>,
    stale: Arc<AtomicBool>,
}

impl Watcher {
    async fn run(self, mut feed: watch::Receiver<KvEvent>, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(key = %self.key, "topology watch stopped");
                    return;
                }
                changed = feed.changed() => {
                    if changed.is_err() {
                        warn!(key = %self.key, "membership feed closed, keeping last topology");
                        self.mark_stale();
                        return;
                    }
                    let event = feed.borrow_and_update().clone();
                    self.apply(event);
                }
            }
        }
    }

    fn apply(&self, event: KvEvent) {
        match event {
            KvEvent::Value(value) => {
                let current = self.tx.borrow().version();
                if value.version == current && !self.stale.load(Ordering::Acquire) {
                    return;
                }
                match decode(&value, self.hasher) {
                    Ok(topology) => {
                        info!(
                            key = %self.key,
                            version = topology.version(),
                            num_shards = topology.num_shards(),
                            hosts = topology.hosts().len(),
                            "topology updated"
                        );
                        if self.stale.swap(false, Ordering::AcqRel) {
                            info!(key = %self.key, "topology feed recovered");
                        }
                        self.tx.send_replace(Arc::new(topology));
                    }
                    Err(e) => {
                        warn!(
                            key = %self.key,
                            version = value.version,
                            error = %e,
                            "invalid topology update, keeping last topology"
                        );
                        self.mark_stale();
                    }
                }
            }
            KvEvent::Missing => {
                warn!(key = %self.key, "topology deleted from feed, keeping last topology");
                self.mark_stale();
            }
            KvEvent::Unavailable(reason) => {
                warn!(key = %self.key, %reason, "membership feed unavailable, keeping last topology");
                self.mark_stale();
            }
        }
    }

    fn mark_stale(&self) {
        self.stale.store(true, Ordering::Release);
    }
}
