//! Per-host outbound queues
//!
//! Every host gets a bounded channel drained by its own worker task, created
//! on first use. A full channel makes `enqueue` wait, which pushes
//! backpressure onto the writer. Workers report each send result into the
//! op's aggregator and close the op back into its pool, including replies
//! that arrive after their write was resolved. Once closed, no new worker is
//! started and further ops fail with `TransportError::Closed`.

use crate::error::TransportError;
use crate::op::WriteOp;
use crate::stats::WriteStats;
use crate::transport::HostTransport;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use quiver_cluster::Host;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

type OpSender = mpsc::Sender<Box<WriteOp>>;

/// Outbound queues keyed by host id
pub struct HostQueues {
    transport: Arc<dyn HostTransport>,
    stats: Arc<WriteStats>,
    capacity: usize,
    senders: DashMap<String, OpSender>,
    closed: AtomicBool,
}

impl HostQueues {
    /// Create queues holding up to `capacity` pending ops per host
    pub fn new(
        transport: Arc<dyn HostTransport>,
        stats: Arc<WriteStats>,
        capacity: usize,
    ) -> Self {
        Self {
            transport,
            stats,
            capacity: capacity.max(1),
            senders: DashMap::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// Queue an op for `host`, waiting while the host's queue is full
    pub async fn enqueue(&self, host: &Arc<Host>, op: Box<WriteOp>) {
        let Some(tx) = self.sender(host) else {
            debug!(host = %host, "host queues closed, failing write operation");
            return fail_closed(op);
        };
        if let Err(mpsc::error::SendError(op)) = tx.send(op).await {
            warn!(host = %host, "host queue closed, failing write operation");
            fail_closed(op);
        }
    }

    /// Number of hosts with a live queue
    pub fn len(&self) -> usize {
        self.senders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }

    /// Drop every queue. Workers finish what is already queued, then exit.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let hosts = self.senders.len();
        self.senders.clear();
        info!(hosts, "host queues closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Sender for `host`, starting its worker on first use. `None` once
    /// closed.
    fn sender(&self, host: &Arc<Host>) -> Option<OpSender> {
        if self.is_closed() {
            return None;
        }
        if let Some(tx) = self.senders.get(host.id.as_str()) {
            return Some(tx.clone());
        }
        // The flag is read under the entry's shard lock, which `close` takes
        // after setting it, so no worker starts once `close` has cleared.
        match self.senders.entry(host.id.clone()) {
            Entry::Occupied(entry) => Some(entry.get().clone()),
            Entry::Vacant(entry) => {
                if self.is_closed() {
                    return None;
                }
                Some(entry.insert(self.spawn_worker(host)).clone())
            }
        }
    }

    fn spawn_worker(&self, host: &Host) -> OpSender {
        let (tx, rx) = mpsc::channel(self.capacity);
        debug!(host = %host, capacity = self.capacity, "starting host queue");
        let worker = Worker {
            host_id: host.id.clone(),
            transport: Arc::clone(&self.transport),
            stats: Arc::clone(&self.stats),
        };
        tokio::spawn(worker.run(rx));
        tx
    }
}

fn fail_closed(mut op: Box<WriteOp>) {
    op.complete(Err(TransportError::Closed));
    op.close();
}

struct Worker {
    host_id: String,
    transport: Arc<dyn HostTransport>,
    stats: Arc<WriteStats>,
}

impl Worker {
    async fn run(self, mut rx: mpsc::Receiver<Box<WriteOp>>) {
        while let Some(mut op) = rx.recv().await {
            let result = match op.host() {
                Some(host) => self.transport.send(host, &op).await,
                None => Err(TransportError::Rejected(
                    "write operation has no target host".to_string(),
                )),
            };
            if let Err(err) = &result {
                self.stats.record_transport_error();
                debug!(host = %self.host_id, shard = op.shard(), error = %err, "replica write failed");
            }
            op.complete(result);
            op.close();
        }
        debug!(host = %self.host_id, "host queue drained");
    }
}
