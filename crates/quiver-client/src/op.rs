//! Per-replica write operations
//!
//! A `WriteOp` carries one datapoint to one replica host. Ops are pooled and
//! recycled across unrelated writes, so `reset` rebuilds a fresh zero value
//! and drops every reference to the previous series, namespace, host and
//! aggregator. Only the link to the owning pool survives a reset, which lets
//! `close` return the op without the caller holding the pool.

use crate::aggregator::CompletionAggregator;
use crate::error::TransportError;
use crate::pool::PoolRef;
use quiver_cluster::{Host, ShardId, UNASSIGNED_SHARD};
use quiver_core::{Datapoint, NamespaceId, SeriesIdentity};
use std::sync::Arc;

/// Write of one datapoint to one replica
#[derive(Debug)]
pub struct WriteOp {
    shard: ShardId,
    namespace: Option<NamespaceId>,
    series: Option<Arc<SeriesIdentity>>,
    datapoint: Datapoint,
    host: Option<Arc<Host>>,
    completion: Option<Arc<CompletionAggregator>>,
    pool: PoolRef,
}

impl Default for WriteOp {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl WriteOp {
    /// A free op: unassigned shard, no references held
    pub fn zeroed() -> Self {
        Self::pooled(PoolRef::default())
    }

    /// A free op owned by `pool`
    pub(crate) fn pooled(pool: PoolRef) -> Self {
        Self {
            shard: UNASSIGNED_SHARD,
            namespace: None,
            series: None,
            datapoint: Datapoint::default(),
            host: None,
            completion: None,
            pool,
        }
    }

    /// Fill the op for a dispatch
    pub fn populate(
        &mut self,
        shard: ShardId,
        namespace: NamespaceId,
        series: Arc<SeriesIdentity>,
        datapoint: Datapoint,
        host: Arc<Host>,
        completion: Arc<CompletionAggregator>,
    ) {
        self.shard = shard;
        self.namespace = Some(namespace);
        self.series = Some(series);
        self.datapoint = datapoint;
        self.host = Some(host);
        self.completion = Some(completion);
    }

    /// Report the send result to the owning aggregator. Only the first call
    /// has an effect.
    pub fn complete(&mut self, result: Result<(), TransportError>) {
        if let Some(completion) = self.completion.take() {
            completion.on_reply(result);
        }
    }

    /// Restore the zero state
    pub fn reset(&mut self) {
        let pool = std::mem::take(&mut self.pool);
        *self = Self::pooled(pool);
    }

    /// Reset the op and return it to its owning pool. An op without a live
    /// pool is dropped.
    pub fn close(self: Box<Self>) {
        if let Some(pool) = self.pool.upgrade() {
            pool.release(self);
        }
    }

    /// True if the op holds no write
    pub fn is_free(&self) -> bool {
        self.shard == UNASSIGNED_SHARD
            && self.namespace.is_none()
            && self.series.is_none()
            && self.host.is_none()
            && self.completion.is_none()
    }

    pub fn shard(&self) -> ShardId {
        self.shard
    }

    pub fn namespace(&self) -> Option<&NamespaceId> {
        self.namespace.as_ref()
    }

    pub fn series(&self) -> Option<&SeriesIdentity> {
        self.series.as_deref()
    }

    pub fn datapoint(&self) -> Datapoint {
        self.datapoint
    }

    /// Target host
    pub fn host(&self) -> Option<&Arc<Host>> {
        self.host.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::Completion;
    use crate::consistency::ConsistencyLevel;
    use crate::stats::WriteStats;

    fn populated() -> (WriteOp, Arc<SeriesIdentity>) {
        let series = Arc::new(
            SeriesIdentity::builder("cpu.user")
                .tag("host", "web-01")
                .tag("dc", "east")
                .build()
                .unwrap(),
        );
        let completion = CompletionAggregator::new(
            ConsistencyLevel::One,
            1,
            1,
            Arc::new(WriteStats::new()),
            Completion::callback(|_| {}),
        );

        let mut op = WriteOp::zeroed();
        op.populate(
            7,
            NamespaceId::from("metrics"),
            Arc::clone(&series),
            Datapoint::new(1_000, 42.0),
            Arc::new(Host::new("a", "a:9000")),
            completion,
        );
        (op, series)
    }

    #[test]
    fn test_zeroed_is_free() {
        let op = WriteOp::default();
        assert!(op.is_free());
        assert_eq!(op.shard(), UNASSIGNED_SHARD);
        assert!(op.series().is_none());
    }

    #[test]
    fn test_populate() {
        let (op, _) = populated();
        assert!(!op.is_free());
        assert_eq!(op.shard(), 7);
        assert_eq!(op.namespace().map(|n| n.as_str()), Some("metrics"));
        assert_eq!(op.series().unwrap().get_tag("host"), Some("web-01"));
        assert_eq!(op.datapoint().value, 42.0);
        assert_eq!(op.host().unwrap().id, "a");
    }

    #[test]
    fn test_reset_drops_references() {
        let (mut op, series) = populated();
        assert_eq!(Arc::strong_count(&series), 2);

        op.reset();
        assert!(op.is_free());
        assert_eq!(Arc::strong_count(&series), 1);
        assert_eq!(op.datapoint(), Datapoint::default());
    }

    #[test]
    fn test_complete_once() {
        let (mut op, _) = populated();
        op.complete(Ok(()));
        op.complete(Err(TransportError::Closed));
        assert!(op.completion.is_none());
    }
}
