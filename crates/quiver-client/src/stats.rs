//! Write path counters

use crate::error::WriteError;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for a write session
#[derive(Debug, Default)]
pub struct WriteStats {
    /// Logical writes submitted
    pub writes: AtomicU64,
    /// Writes resolved as success
    pub successes: AtomicU64,
    /// Writes resolved as failure (any kind)
    pub failures: AtomicU64,
    /// Failures due to the aggregation deadline
    pub timeouts: AtomicU64,
    /// Failures decided before any replica was contacted
    pub rejected: AtomicU64,
    /// Per-replica operations queued for sending
    pub ops_sent: AtomicU64,
    /// Per-replica sends that returned an error
    pub transport_errors: AtomicU64,
    /// Replies that arrived after their write was resolved
    pub late_replies: AtomicU64,
}

/// Point-in-time copy of [`WriteStats`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WriteStatsSnapshot {
    pub writes: u64,
    pub successes: u64,
    pub failures: u64,
    pub timeouts: u64,
    pub rejected: u64,
    pub ops_sent: u64,
    pub transport_errors: u64,
    pub late_replies: u64,
}

impl WriteStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_op_sent(&self) {
        self.ops_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_transport_error(&self) {
        self.transport_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_late_reply(&self) {
        self.late_replies.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the resolved outcome of a logical write
    pub fn record_outcome(&self, outcome: &Result<(), WriteError>) {
        match outcome {
            Ok(()) => {
                self.successes.fetch_add(1, Ordering::Relaxed);
            }
            Err(err) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                if matches!(err, WriteError::Timeout { .. }) {
                    self.timeouts.fetch_add(1, Ordering::Relaxed);
                }
                if err.is_rejection() {
                    self.rejected.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
    }

    pub fn snapshot(&self) -> WriteStatsSnapshot {
        WriteStatsSnapshot {
            writes: self.writes.load(Ordering::Relaxed),
            successes: self.successes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            ops_sent: self.ops_sent.load(Ordering::Relaxed),
            transport_errors: self.transport_errors.load(Ordering::Relaxed),
            late_replies: self.late_replies.load(Ordering::Relaxed),
        }
    }
}
