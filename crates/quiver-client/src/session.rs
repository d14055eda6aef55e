//! Write dispatch
//!
//! `WriteSession::write` checks the namespace write window, captures the
//! current topology snapshot, routes the series to a shard and fans the
//! datapoint out to every eligible replica of that shard. The callback
//! receives the aggregated outcome exactly once.
//!
//! Rejections decided before dispatch (closed session, unknown namespace,
//! out-of-window timestamp, no eligible replica, unreachable consistency)
//! invoke the callback before `write` returns.
//!
//! Ops and aggregators come from pools and deadlines share one timer task.
//! `write_with_handler` delivers outcomes to a shared handler, so a write
//! through it allocates nothing once the pools have warmed up.

use crate::aggregator::{AggregatorPool, Completion, CompletionHandler};
use crate::consistency::ConsistencyLevel;
use crate::deadline::Deadlines;
use crate::error::{ClientError, Result, WriteError};
use crate::pool::WriteOpPool;
use crate::queue::HostQueues;
use crate::stats::{WriteStats, WriteStatsSnapshot};
use crate::transport::HostTransport;
use quiver_cluster::{Topology, TopologyResolver, WriteTargetPolicy};
use quiver_core::time::{duration_str, now_nanos};
use quiver_core::{Datapoint, NamespaceId, SeriesIdentity, Timestamp};
use quiver_retention::NamespaceRegistry;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, info};

/// Write path options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriteOptions {
    /// Consistency level for writes that do not set one
    pub consistency: ConsistencyLevel,
    /// Deadline for a write to resolve
    #[serde(with = "duration_str")]
    pub timeout: Duration,
    /// Write ops preallocated in the pool
    pub pool_size: usize,
    /// Pending ops per host before writers wait
    pub host_queue_size: usize,
    /// Which replica states receive new writes
    pub target_policy: WriteTargetPolicy,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            consistency: ConsistencyLevel::default(),
            timeout: Duration::from_secs(10),
            pool_size: 4096,
            host_queue_size: 1024,
            target_policy: WriteTargetPolicy::default(),
        }
    }
}

impl WriteOptions {
    /// Validate the options
    pub fn validate(&self) -> Result<()> {
        if self.timeout.is_zero() {
            return Err(ClientError::Config("write timeout must be positive".to_string()));
        }
        if self.host_queue_size == 0 {
            return Err(ClientError::Config(
                "host queue size must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// A single datapoint write
#[derive(Debug, Clone)]
pub struct WriteRequest {
    pub namespace: NamespaceId,
    pub series: Arc<SeriesIdentity>,
    pub datapoint: Datapoint,
    /// Overrides the session's default level
    pub consistency: Option<ConsistencyLevel>,
}

impl WriteRequest {
    /// Create a new write request
    pub fn new(
        namespace: impl Into<NamespaceId>,
        series: impl Into<Arc<SeriesIdentity>>,
        timestamp: Timestamp,
        value: f64,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            series: series.into(),
            datapoint: Datapoint::new(timestamp, value),
            consistency: None,
        }
    }

    /// Set the consistency level for this write
    pub fn with_consistency(mut self, level: ConsistencyLevel) -> Self {
        self.consistency = Some(level);
        self
    }
}

/// Dispatches writes to the replicas of their shard
pub struct WriteSession {
    resolver: Arc<dyn TopologyResolver>,
    namespaces: Arc<NamespaceRegistry>,
    pool: WriteOpPool,
    aggregators: AggregatorPool,
    deadlines: Deadlines,
    queues: HostQueues,
    options: WriteOptions,
    stats: Arc<WriteStats>,
    closed: AtomicBool,
}

impl WriteSession {
    /// Create a new write session. Must be called within a Tokio runtime.
    pub fn new(
        resolver: Arc<dyn TopologyResolver>,
        namespaces: Arc<NamespaceRegistry>,
        transport: Arc<dyn HostTransport>,
        options: WriteOptions,
    ) -> Result<Self> {
        options.validate()?;

        let pool = WriteOpPool::new(options.pool_size);
        let stats = Arc::new(WriteStats::new());
        let aggregators = AggregatorPool::new(Arc::clone(&stats));
        let deadlines = Deadlines::new(options.timeout);
        let queues = HostQueues::new(transport, Arc::clone(&stats), options.host_queue_size);

        info!(
            consistency = %options.consistency,
            timeout = ?options.timeout,
            pool_size = options.pool_size,
            host_queue_size = options.host_queue_size,
            "write session started"
        );

        Ok(Self {
            resolver,
            namespaces,
            pool,
            aggregators,
            deadlines,
            queues,
            options,
            stats,
            closed: AtomicBool::new(false),
        })
    }

    /// Dispatch a write. `on_complete` is invoked exactly once with the
    /// outcome. Waits only while a target host's queue is full.
    pub async fn write<F>(&self, request: WriteRequest, on_complete: F)
    where
        F: FnOnce(std::result::Result<(), WriteError>) + Send + 'static,
    {
        self.dispatch(request, Completion::callback(on_complete)).await
    }

    /// Dispatch a write whose outcome goes to `handler` with `token`
    pub async fn write_with_handler(
        &self,
        request: WriteRequest,
        handler: &Arc<dyn CompletionHandler>,
        token: u64,
    ) {
        let completion = Completion::Handler {
            handler: Arc::clone(handler),
            token,
        };
        self.dispatch(request, completion).await
    }

    async fn dispatch(&self, request: WriteRequest, completion: Completion) {
        self.stats.record_write();

        if self.closed.load(Ordering::Acquire) {
            return self.reject(WriteError::Closed, completion);
        }
        if let Err(err) = self.namespaces.check_write(
            &request.namespace,
            request.datapoint.timestamp,
            now_nanos(),
        ) {
            return self.reject(err.into(), completion);
        }

        let topology = self.resolver.resolve();
        let shard = topology.shard_for(&request.series);
        let policy = self.options.target_policy;
        let targets = topology.write_targets(shard, policy).count();
        if targets == 0 {
            return self.reject(WriteError::NoAvailableReplicas { shard }, completion);
        }

        let level = request.consistency.unwrap_or(self.options.consistency);
        let rf = topology.replication_factor();
        let required = level.required_for(rf, targets);
        if targets < level.minimum_targets(rf) {
            return self.reject(
                WriteError::ConsistencyNotReached {
                    level,
                    successes: 0,
                    required,
                    cause: None,
                },
                completion,
            );
        }

        let aggregator = self.aggregators.acquire(level, targets, required, completion);
        self.deadlines.schedule(&aggregator);

        // Same snapshot as the count above
        for replica in topology.write_targets(shard, policy) {
            let mut op = self.pool.acquire();
            op.populate(
                shard,
                request.namespace.clone(),
                Arc::clone(&request.series),
                request.datapoint,
                Arc::clone(&replica.host),
                Arc::clone(&aggregator),
            );
            self.stats.record_op_sent();
            self.queues.enqueue(&replica.host, op).await;
        }
    }

    /// Dispatch a write and wait for its outcome
    pub async fn write_and_wait(&self, request: WriteRequest) -> std::result::Result<(), WriteError> {
        let (tx, rx) = oneshot::channel();
        self.write(request, move |result| {
            let _ = tx.send(result);
        })
        .await;
        rx.await.unwrap_or(Err(WriteError::Closed))
    }

    /// Current topology snapshot
    pub fn topology(&self) -> Arc<Topology> {
        self.resolver.resolve()
    }

    /// True while the topology source is serving a last-known-good snapshot
    pub fn is_topology_stale(&self) -> bool {
        self.resolver.is_stale()
    }

    pub fn namespaces(&self) -> &NamespaceRegistry {
        &self.namespaces
    }

    pub fn pool(&self) -> &WriteOpPool {
        &self.pool
    }

    pub fn aggregators(&self) -> &AggregatorPool {
        &self.aggregators
    }

    pub fn options(&self) -> &WriteOptions {
        &self.options
    }

    pub fn stats(&self) -> WriteStatsSnapshot {
        self.stats.snapshot()
    }

    /// Stop accepting writes and shut down host queues. Queued ops are
    /// still sent and pending writes still time out.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.queues.close();
        self.resolver.close();
        info!("write session closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn reject(&self, err: WriteError, completion: Completion) {
        debug!(error = %err, "write rejected");
        let outcome = Err(err);
        self.stats.record_outcome(&outcome);
        completion.deliver(outcome);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::op::WriteOp;
    use async_trait::async_trait;
    use quiver_cluster::{Host, ShardHasher, ShardState, StaticOptions, StaticResolver};
    use quiver_retention::{NamespaceMetadata, RetentionOptions};

    struct AckTransport;

    #[async_trait]
    impl HostTransport for AckTransport {
        async fn send(&self, host: &Host, _op: &WriteOp) -> std::result::Result<(), TransportError> {
            if host.id == "down" {
                return Err(TransportError::Network("unreachable".to_string()));
            }
            Ok(())
        }
    }

    fn registry() -> Arc<NamespaceRegistry> {
        let registry = NamespaceRegistry::new();
        registry.register(NamespaceMetadata::new("metrics", RetentionOptions::default()).unwrap());
        Arc::new(registry)
    }

    fn session(resolver: Arc<dyn TopologyResolver>, options: WriteOptions) -> WriteSession {
        WriteSession::new(resolver, registry(), Arc::new(AckTransport), options).unwrap()
    }

    fn single_host() -> Arc<dyn TopologyResolver> {
        Arc::new(
            StaticResolver::new(&StaticOptions::single_host(8, Host::new("a", "a:9000"))).unwrap(),
        )
    }

    fn request(ts: Timestamp) -> WriteRequest {
        WriteRequest::new(
            "metrics",
            SeriesIdentity::builder("cpu.idle").tag("host", "web-01").build().unwrap(),
            ts,
            0.5,
        )
    }

    #[test]
    fn test_options_from_yaml() {
        let options: WriteOptions = serde_yaml::from_str(
            "consistency: all\ntimeout: 2s\ntarget_policy:\n  include_leaving: true\n",
        )
        .unwrap();
        assert_eq!(options.consistency, ConsistencyLevel::All);
        assert_eq!(options.timeout, Duration::from_secs(2));
        assert_eq!(options.pool_size, 4096);
        assert!(options.target_policy.include_initializing);
        assert!(options.target_policy.include_leaving);

        let bad = WriteOptions {
            host_queue_size: 0,
            ..WriteOptions::default()
        };
        assert!(bad.validate().is_err());
    }

    #[tokio::test]
    async fn test_write_single_host() {
        let session = session(single_host(), WriteOptions::default());
        session.write_and_wait(request(now_nanos())).await.unwrap();

        let stats = session.stats();
        assert_eq!(stats.writes, 1);
        assert_eq!(stats.ops_sent, 1);
        assert_eq!(stats.successes, 1);
    }

    #[tokio::test]
    async fn test_unknown_namespace() {
        let session = session(single_host(), WriteOptions::default());
        let req = WriteRequest::new("logs", SeriesIdentity::new("x").unwrap(), now_nanos(), 1.0);
        let err = session.write_and_wait(req).await.unwrap_err();
        assert!(matches!(err, WriteError::UnknownNamespace(_)));
        assert_eq!(session.stats().ops_sent, 0);
    }

    #[tokio::test]
    async fn test_all_needs_full_replica_set() {
        let hasher = ShardHasher::default();
        let a = Host::new("a", "a:9000");
        let b = Host::new("b", "b:9000");
        let topology = Topology::builder(4, hasher)
            .replication_factor(2)
            .assign_all(&a, ShardState::Available)
            .assign_all(&b, ShardState::Leaving)
            .build()
            .unwrap();
        let session = session(
            Arc::new(StaticResolver::from_topology(topology)),
            WriteOptions::default(),
        );

        let err = session
            .write_and_wait(request(now_nanos()).with_consistency(ConsistencyLevel::All))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            WriteError::ConsistencyNotReached {
                successes: 0,
                required: 2,
                cause: None,
                ..
            }
        ));
        assert_eq!(session.stats().ops_sent, 0);

        session
            .write_and_wait(request(now_nanos()).with_consistency(ConsistencyLevel::One))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_closed_session_rejects() {
        let session = session(single_host(), WriteOptions::default());
        session.close();
        assert!(session.is_closed());
        let err = session.write_and_wait(request(now_nanos())).await.unwrap_err();
        assert!(matches!(err, WriteError::Closed));
        assert_eq!(session.stats().rejected, 1);
    }
}
