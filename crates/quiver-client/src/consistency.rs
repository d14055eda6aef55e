//! Write consistency levels
//!
//! A level decides how many replica acknowledgements make a write
//! successful, and when enough replicas have failed that success is no
//! longer reachable.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Write consistency level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsistencyLevel {
    /// Any single replica must acknowledge
    One,
    /// A majority must acknowledge, or at least one once every replica has
    /// replied
    UnstrictMajority,
    /// A majority of replicas must acknowledge
    #[default]
    Majority,
    /// All replicas must acknowledge
    All,
}

/// Aggregated decision for a write given the replies so far
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Pending,
    Success,
    Failure,
}

/// Reply counts for one logical write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Tally {
    /// Replicas the write was dispatched to
    pub expected: usize,
    /// Replies received
    pub received: usize,
    /// Successful replies
    pub successes: usize,
    /// Acknowledgements the level requires
    pub required: usize,
}

impl ConsistencyLevel {
    /// Acknowledgements required for success with `replication_factor`
    /// replicas
    pub fn required_acks(&self, replication_factor: usize) -> usize {
        match self {
            ConsistencyLevel::One => 1,
            ConsistencyLevel::UnstrictMajority | ConsistencyLevel::Majority => {
                (replication_factor / 2) + 1
            }
            ConsistencyLevel::All => replication_factor,
        }
    }

    /// Acknowledgements required for a write dispatched to `targets`
    /// replicas of a shard with `replication_factor`. During a shard move
    /// `targets` can exceed the replication factor, and `All` then needs
    /// every dispatched replica.
    pub fn required_for(&self, replication_factor: usize, targets: usize) -> usize {
        match self {
            ConsistencyLevel::All => replication_factor.max(targets),
            _ => self.required_acks(replication_factor),
        }
    }

    /// Fewest targets a write must reach to have any chance of success
    pub fn minimum_targets(&self, replication_factor: usize) -> usize {
        match self {
            ConsistencyLevel::UnstrictMajority => 1,
            _ => self.required_acks(replication_factor),
        }
    }

    /// Decide the outcome from the replies so far
    pub fn evaluate(&self, tally: Tally) -> Decision {
        if tally.successes >= tally.required {
            return Decision::Success;
        }

        let remaining = tally.expected.saturating_sub(tally.received);
        match self {
            ConsistencyLevel::UnstrictMajority => {
                if remaining > 0 {
                    Decision::Pending
                } else if tally.successes > 0 {
                    Decision::Success
                } else {
                    Decision::Failure
                }
            }
            _ => {
                if tally.successes + remaining < tally.required {
                    Decision::Failure
                } else {
                    Decision::Pending
                }
            }
        }
    }
}

impl fmt::Display for ConsistencyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConsistencyLevel::One => "one",
            ConsistencyLevel::UnstrictMajority => "unstrict_majority",
            ConsistencyLevel::Majority => "majority",
            ConsistencyLevel::All => "all",
        };
        f.write_str(name)
    }
}
