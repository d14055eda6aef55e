//! Write deadlines
//!
//! A session runs a single timer task that expires the deadlines of all its
//! in-flight writes from one `DelayQueue`. Entries stay queued after their
//! write resolves and are ignored on expiry, since the aggregator has moved
//! on to a later generation or is already resolved.

use crate::aggregator::CompletionAggregator;
use std::future::poll_fn;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::time::DelayQueue;
use tracing::{debug, warn};

struct Deadline {
    aggregator: Arc<CompletionAggregator>,
    generation: u64,
}

/// Handle to a session's deadline timer
#[derive(Debug, Clone)]
pub struct Deadlines {
    tx: mpsc::UnboundedSender<Deadline>,
    timeout: Duration,
}

impl Deadlines {
    /// Start the timer task. Must be called within a Tokio runtime. The task
    /// exits once every handle is dropped and the queued deadlines expire.
    pub fn new(timeout: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run(rx, timeout));
        Self { tx, timeout }
    }

    /// Time out the aggregator's current write unless it resolves first
    pub fn schedule(&self, aggregator: &Arc<CompletionAggregator>) {
        let deadline = Deadline {
            generation: aggregator.generation(),
            aggregator: Arc::clone(aggregator),
        };
        if self.tx.send(deadline).is_err() {
            warn!("deadline timer stopped, write will not time out");
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

async fn run(mut rx: mpsc::UnboundedReceiver<Deadline>, timeout: Duration) {
    let mut queue: DelayQueue<Deadline> = DelayQueue::new();
    let mut open = true;

    loop {
        tokio::select! {
            deadline = rx.recv(), if open => match deadline {
                Some(deadline) => {
                    queue.insert(deadline, timeout);
                }
                None => open = false,
            },
            Some(expired) = poll_fn(|cx| queue.poll_expired(cx)), if !queue.is_empty() => {
                let deadline = expired.into_inner();
                deadline.aggregator.on_timeout(deadline.generation, timeout);
            }
            else => break,
        }
    }
    debug!("deadline timer stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::{AggregatorPool, Completion};
    use crate::consistency::ConsistencyLevel;
    use crate::error::WriteError;
    use crate::stats::WriteStats;
    use parking_lot::Mutex;

    #[tokio::test(start_paused = true)]
    async fn test_pending_write_times_out() {
        let outcomes = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&outcomes);
        let pool = AggregatorPool::new(Arc::new(WriteStats::new()));
        let deadlines = Deadlines::new(Duration::from_secs(2));

        let agg = pool.acquire(
            ConsistencyLevel::Majority,
            3,
            2,
            Completion::callback(move |result| sink.lock().push(result)),
        );
        deadlines.schedule(&agg);
        agg.on_reply(Ok(()));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(!agg.is_resolved());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(agg.is_resolved());
        assert!(matches!(
            outcomes.lock()[0],
            Err(WriteError::Timeout {
                successes: 1,
                required: 2,
                ..
            })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_of_recycled_write_ignored() {
        let stats = Arc::new(WriteStats::new());
        let pool = AggregatorPool::new(Arc::clone(&stats));
        let deadlines = Deadlines::new(Duration::from_secs(1));

        let first = pool.acquire(ConsistencyLevel::One, 1, 1, Completion::callback(|_| {}));
        deadlines.schedule(&first);
        first.on_reply(Ok(()));

        // Reuses the same aggregator, without a deadline of its own
        let second = pool.acquire(ConsistencyLevel::One, 1, 1, Completion::callback(|_| {}));
        assert!(Arc::ptr_eq(&first, &second));

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(!second.is_resolved());
        assert_eq!(stats.snapshot().timeouts, 0);
        assert_eq!(stats.snapshot().successes, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_queued_deadlines_fire_after_handle_dropped() {
        let stats = Arc::new(WriteStats::new());
        let pool = AggregatorPool::new(Arc::clone(&stats));
        let deadlines = Deadlines::new(Duration::from_secs(1));

        let agg = pool.acquire(ConsistencyLevel::One, 1, 1, Completion::callback(|_| {}));
        deadlines.schedule(&agg);
        drop(deadlines);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(agg.is_resolved());
        assert_eq!(stats.snapshot().timeouts, 1);
    }
}
