//! Pool of reusable write operations
//!
//! `acquire` never blocks: an empty pool allocates a new op. `release`
//! resets the op before putting it back on the free list. The pool grows to
//! the peak number of in-flight ops and never shrinks.
//!
//! Every op keeps a weak link to the pool that created it, so a finished op
//! can return itself through `WriteOp::close`.

use crate::op::WriteOp;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

/// Shared free list of write operations
#[derive(Debug, Clone)]
pub struct WriteOpPool {
    inner: Arc<PoolInner>,
}

#[derive(Debug)]
struct PoolInner {
    free: Mutex<Vec<Box<WriteOp>>>,
    allocated: AtomicUsize,
}

/// Weak link from an op to its owning pool
#[derive(Debug, Clone, Default)]
pub(crate) struct PoolRef(Weak<PoolInner>);

impl PoolRef {
    pub(crate) fn upgrade(&self) -> Option<WriteOpPool> {
        self.0.upgrade().map(|inner| WriteOpPool { inner })
    }
}

impl WriteOpPool {
    /// Create a pool with `initial` preallocated ops
    pub fn new(initial: usize) -> Self {
        let inner = Arc::new_cyclic(|pool: &Weak<PoolInner>| {
            let free: Vec<Box<WriteOp>> = (0..initial)
                .map(|_| Box::new(WriteOp::pooled(PoolRef(pool.clone()))))
                .collect();
            PoolInner {
                free: Mutex::new(free),
                allocated: AtomicUsize::new(initial),
            }
        });
        Self { inner }
    }

    /// Take a free op, allocating one if the pool is empty
    pub fn acquire(&self) -> Box<WriteOp> {
        if let Some(op) = self.inner.free.lock().pop() {
            return op;
        }
        self.inner.allocated.fetch_add(1, Ordering::Relaxed);
        Box::new(WriteOp::pooled(PoolRef(Arc::downgrade(&self.inner))))
    }

    /// Reset an op and return it to the pool
    pub fn release(&self, mut op: Box<WriteOp>) {
        op.reset();
        self.inner.free.lock().push(op);
    }

    /// Ops currently on the free list
    pub fn available(&self) -> usize {
        self.inner.free.lock().len()
    }

    /// Ops ever allocated by this pool
    pub fn allocated(&self) -> usize {
        self.inner.allocated.load(Ordering::Relaxed)
    }
}

impl Default for WriteOpPool {
    fn default() -> Self {
        Self::new(0)
    }
}
