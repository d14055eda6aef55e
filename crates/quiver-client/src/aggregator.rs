//! Completion aggregation
//!
//! Each logical write owns one `CompletionAggregator` shared by its
//! per-replica ops. Replies are counted under a single mutex. The outcome is
//! delivered exactly once: on success, on early failure once the consistency
//! level is unreachable, or on timeout. Replies after that are counted as
//! late and otherwise ignored.
//!
//! Aggregators are pooled. Once every dispatched replica has replied the
//! aggregator goes back to its `AggregatorPool` and is re-armed for a later
//! write under a new generation. Deadlines carry the generation they were
//! scheduled for, so one that outlives its write has no effect.

use crate::consistency::{ConsistencyLevel, Decision, Tally};
use crate::error::{TransportError, WriteError};
use crate::stats::WriteStats;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::debug;

/// Callback receiving the outcome of a logical write
pub type CompletionFn = Box<dyn FnOnce(Result<(), WriteError>) + Send + 'static>;

/// Receives the outcomes of many writes, each tagged with a caller token
pub trait CompletionHandler: Send + Sync + 'static {
    fn on_complete(&self, token: u64, result: Result<(), WriteError>);
}

/// Where the outcome of a logical write is delivered
pub enum Completion {
    /// One-shot callback owned by the write
    Callback(CompletionFn),
    /// Shared handler, called with the write's token
    Handler {
        handler: Arc<dyn CompletionHandler>,
        token: u64,
    },
}

impl Completion {
    /// Wrap a closure
    pub fn callback<F>(f: F) -> Self
    where
        F: FnOnce(Result<(), WriteError>) + Send + 'static,
    {
        Completion::Callback(Box::new(f))
    }

    pub(crate) fn deliver(self, result: Result<(), WriteError>) {
        match self {
            Completion::Callback(callback) => callback(result),
            Completion::Handler { handler, token } => handler.on_complete(token, result),
        }
    }
}

/// Aggregates per-replica replies into one outcome
pub struct CompletionAggregator {
    stats: Arc<WriteStats>,
    pool: Weak<AggregatorPoolInner>,
    state: Mutex<State>,
}

struct State {
    generation: u64,
    level: ConsistencyLevel,
    expected: usize,
    required: usize,
    received: usize,
    successes: usize,
    first_error: Option<TransportError>,
    /// `None` once resolved
    completion: Option<Completion>,
}

impl State {
    fn idle() -> Self {
        Self {
            generation: 0,
            level: ConsistencyLevel::default(),
            expected: 0,
            required: 0,
            received: 0,
            successes: 0,
            first_error: None,
            completion: None,
        }
    }

    /// Count a reply. Returns the completion and outcome once decided.
    fn apply(
        &mut self,
        result: Result<(), TransportError>,
    ) -> Option<(Completion, Result<(), WriteError>)> {
        match result {
            Ok(()) => self.successes += 1,
            Err(err) => {
                if self.first_error.is_none() {
                    self.first_error = Some(err);
                }
            }
        }

        let tally = Tally {
            expected: self.expected,
            received: self.received,
            successes: self.successes,
            required: self.required,
        };
        let outcome = match self.level.evaluate(tally) {
            Decision::Pending => return None,
            Decision::Success => Ok(()),
            Decision::Failure => Err(WriteError::ConsistencyNotReached {
                level: self.level,
                successes: self.successes,
                required: self.required,
                cause: self.first_error.take(),
            }),
        };
        self.completion.take().map(|completion| (completion, outcome))
    }

    /// Drop per-write data, keeping the generation
    fn clear(&mut self) {
        let generation = self.generation;
        *self = Self::idle();
        self.generation = generation;
    }
}

impl CompletionAggregator {
    /// Create an unpooled aggregator expecting `expected` replies,
    /// `required` of which must succeed
    pub fn new(
        level: ConsistencyLevel,
        expected: usize,
        required: usize,
        stats: Arc<WriteStats>,
        completion: Completion,
    ) -> Arc<Self> {
        let aggregator = Arc::new(Self::idle(stats, Weak::new()));
        aggregator.arm(level, expected, required, completion);
        aggregator
    }

    fn idle(stats: Arc<WriteStats>, pool: Weak<AggregatorPoolInner>) -> Self {
        Self {
            stats,
            pool,
            state: Mutex::new(State::idle()),
        }
    }

    /// Start a new write under the next generation
    fn arm(&self, level: ConsistencyLevel, expected: usize, required: usize, completion: Completion) {
        let mut state = self.state.lock();
        let generation = state.generation.wrapping_add(1);
        *state = State {
            generation,
            level,
            expected,
            required,
            received: 0,
            successes: 0,
            first_error: None,
            completion: Some(completion),
        };
    }

    /// Record one replica reply
    pub fn on_reply(self: &Arc<Self>, result: Result<(), TransportError>) {
        let (resolved, drained) = {
            let mut state = self.state.lock();
            state.received += 1;
            let drained = state.received >= state.expected;
            let resolved = if state.completion.is_none() {
                self.stats.record_late_reply();
                None
            } else {
                state.apply(result)
            };
            if drained {
                state.clear();
            }
            (resolved, drained)
        };

        if drained {
            self.recycle();
        }
        if let Some((completion, outcome)) = resolved {
            self.finish(completion, outcome);
        }
    }

    /// Resolve as `Timeout` if the write armed under `generation` is still
    /// pending
    pub fn on_timeout(&self, generation: u64, after: Duration) {
        let (completion, outcome) = {
            let mut state = self.state.lock();
            if state.generation != generation {
                return;
            }
            let Some(completion) = state.completion.take() else {
                return;
            };
            debug!(
                level = %state.level,
                expected = state.expected,
                received = state.received,
                required = state.required,
                ?after,
                "write timed out"
            );
            let outcome = Err(WriteError::Timeout {
                after,
                successes: state.successes,
                required: state.required,
            });
            (completion, outcome)
        };

        self.finish(completion, outcome);
    }

    /// True once the outcome has been delivered
    pub fn is_resolved(&self) -> bool {
        self.state.lock().completion.is_none()
    }

    /// Generation of the current write
    pub fn generation(&self) -> u64 {
        self.state.lock().generation
    }

    pub fn expected(&self) -> usize {
        self.state.lock().expected
    }

    pub fn required(&self) -> usize {
        self.state.lock().required
    }

    fn recycle(self: &Arc<Self>) {
        if let Some(pool) = self.pool.upgrade() {
            pool.free.lock().push(Arc::clone(self));
        }
    }

    fn finish(&self, completion: Completion, outcome: Result<(), WriteError>) {
        if let Err(err) = &outcome {
            debug!(error = %err, "write failed");
        }
        self.stats.record_outcome(&outcome);
        completion.deliver(outcome);
    }
}

impl fmt::Debug for CompletionAggregator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("CompletionAggregator")
            .field("generation", &state.generation)
            .field("level", &state.level)
            .field("expected", &state.expected)
            .field("required", &state.required)
            .field("received", &state.received)
            .field("successes", &state.successes)
            .field("resolved", &state.completion.is_none())
            .finish()
    }
}

/// Free list of aggregators, shared by every write of a session
#[derive(Clone)]
pub struct AggregatorPool {
    inner: Arc<AggregatorPoolInner>,
}

struct AggregatorPoolInner {
    free: Mutex<Vec<Arc<CompletionAggregator>>>,
    allocated: AtomicUsize,
    stats: Arc<WriteStats>,
}

impl AggregatorPool {
    /// Create an empty pool reporting outcomes into `stats`
    pub fn new(stats: Arc<WriteStats>) -> Self {
        Self {
            inner: Arc::new(AggregatorPoolInner {
                free: Mutex::new(Vec::new()),
                allocated: AtomicUsize::new(0),
                stats,
            }),
        }
    }

    /// Take a free aggregator, allocating one if none is free, and arm it
    /// for a write
    pub fn acquire(
        &self,
        level: ConsistencyLevel,
        expected: usize,
        required: usize,
        completion: Completion,
    ) -> Arc<CompletionAggregator> {
        let reused = self.inner.free.lock().pop();
        let aggregator = match reused {
            Some(aggregator) => aggregator,
            None => {
                self.inner.allocated.fetch_add(1, Ordering::Relaxed);
                Arc::new(CompletionAggregator::idle(
                    Arc::clone(&self.inner.stats),
                    Arc::downgrade(&self.inner),
                ))
            }
        };
        aggregator.arm(level, expected, required, completion);
        aggregator
    }

    /// Aggregators currently on the free list
    pub fn available(&self) -> usize {
        self.inner.free.lock().len()
    }

    /// Aggregators ever allocated by this pool
    pub fn allocated(&self) -> usize {
        self.inner.allocated.load(Ordering::Relaxed)
    }
}

impl fmt::Debug for AggregatorPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AggregatorPool")
            .field("available", &self.available())
            .field("allocated", &self.allocated())
            .finish()
    }
}
