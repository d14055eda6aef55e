//! Shard hashing
//!
//! Maps a series ID to a shard number. The hash algorithm and seed are
//! chosen once per cluster; changing either without a coordinated reshape
//! sends existing series to different shards.

use fxhash::FxHasher;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::Hasher;
use xxhash_rust::xxh3::xxh3_64_with_seed;

/// Shard number in `[0, num_shards)`
pub type ShardId = u32;

/// Shard number carried by a write operation that is not in flight
pub const UNASSIGNED_SHARD: ShardId = u32::MAX;

/// Hash algorithm used for shard routing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    /// XXH3 64-bit, seeded - default, good distribution for arbitrary bytes
    #[default]
    Xxh3,
    /// FxHash with the seed mixed in first - cheap, weaker distribution
    Fx,
}

/// Hashing configuration (`hashing` section of the client config)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HashConfig {
    pub algorithm: HashAlgorithm,
    pub seed: u64,
}

/// Seeded hash function mapping series IDs to shards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ShardHasher {
    algorithm: HashAlgorithm,
    seed: u64,
}

impl ShardHasher {
    /// Create a hasher from configuration
    pub fn new(config: HashConfig) -> Self {
        Self {
            algorithm: config.algorithm,
            seed: config.seed,
        }
    }

    /// Create a seeded hasher with the given algorithm
    pub fn with_seed(algorithm: HashAlgorithm, seed: u64) -> Self {
        Self { algorithm, seed }
    }

    /// Configuration this hasher was built from
    pub fn config(&self) -> HashConfig {
        HashConfig {
            algorithm: self.algorithm,
            seed: self.seed,
        }
    }

    /// Hash raw series ID bytes
    pub fn hash(&self, id: &[u8]) -> u64 {
        match self.algorithm {
            HashAlgorithm::Xxh3 => xxh3_64_with_seed(id, self.seed),
            HashAlgorithm::Fx => {
                let mut hasher = FxHasher::default();
                hasher.write_u64(self.seed);
                hasher.write(id);
                hasher.finish()
            }
        }
    }

    /// Compute the shard owning a series ID.
    ///
    /// `num_shards` must be non-zero; topologies never publish a zero shard
    /// count.
    pub fn shard_for(&self, id: &[u8], num_shards: u32) -> ShardId {
        debug_assert!(num_shards > 0, "shard_for called with zero shards");
        (self.hash(id) % u64::from(num_shards)) as ShardId
    }
}

/// State of a shard on one replica host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShardState {
    /// Host is receiving the shard (bootstrapping or streaming it in)
    Initializing,
    /// Host owns the shard and serves it
    Available,
    /// Host is handing the shard off to another host
    Leaving,
    /// Host state could not be determined
    Unknown,
}

impl ShardState {
    /// True while the shard is moving onto or off the host
    pub fn is_transitional(&self) -> bool {
        matches!(self, ShardState::Initializing | ShardState::Leaving)
    }
}

impl fmt::Display for ShardState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShardState::Initializing => write!(f, "initializing"),
            ShardState::Available => write!(f, "available"),
            ShardState::Leaving => write!(f, "leaving"),
            ShardState::Unknown => write!(f, "unknown"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shard_for_in_range() {
        for algorithm in [HashAlgorithm::Xxh3, HashAlgorithm::Fx] {
            let hasher = ShardHasher::with_seed(algorithm, 7);
            for num_shards in [1, 3, 16, 1024] {
                for i in 0..500 {
                    let id = format!("series-{}", i);
                    assert!(hasher.shard_for(id.as_bytes(), num_shards) < num_shards);
                }
            }
        }
    }

    #[test]
    fn test_shard_for_deterministic() {
        let hasher = ShardHasher::new(HashConfig {
            algorithm: HashAlgorithm::Xxh3,
            seed: 42,
        });
        let again = ShardHasher::with_seed(HashAlgorithm::Xxh3, 42);

        for i in 0..100 {
            let id = format!("cpu.user.host{}", i);
            assert_eq!(
                hasher.shard_for(id.as_bytes(), 64),
                again.shard_for(id.as_bytes(), 64)
            );
        }
    }

    #[test]
    fn test_seed_changes_hash() {
        let a = ShardHasher::with_seed(HashAlgorithm::Xxh3, 1);
        let b = ShardHasher::with_seed(HashAlgorithm::Xxh3, 2);
        assert_ne!(a.hash(b"sensor-1"), b.hash(b"sensor-1"));

        let a = ShardHasher::with_seed(HashAlgorithm::Fx, 1);
        let b = ShardHasher::with_seed(HashAlgorithm::Fx, 2);
        assert_ne!(a.hash(b"sensor-1"), b.hash(b"sensor-1"));
    }

    #[test]
    fn test_distribution_is_roughly_uniform() {
        let hasher = ShardHasher::default();
        let num_shards = 8;
        let mut counts = [0usize; 8];
        for i in 0..8000 {
            let id = format!("series-{}", i);
            counts[hasher.shard_for(id.as_bytes(), num_shards) as usize] += 1;
        }
        // Expect 1000 per shard; allow generous skew
        for count in counts {
            assert!(count > 700 && count < 1300, "skewed shard count {}", count);
        }
    }

    #[test]
    fn test_single_shard() {
        let hasher = ShardHasher::default();
        assert_eq!(hasher.shard_for(b"anything", 1), 0);
    }

    #[test]
    fn test_hash_config_serde() {
        let config: HashConfig = serde_json::from_str(r#"{"algorithm":"fx","seed":3}"#).unwrap();
        assert_eq!(config.algorithm, HashAlgorithm::Fx);
        assert_eq!(ShardHasher::new(config).config(), config);

        let config: HashConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, HashConfig::default());
    }
}
