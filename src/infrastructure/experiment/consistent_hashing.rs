//! Consistent hashing for experiment variant assignment
//!
//! The hash is fixed as the first eight bytes (big-endian) of
//! `SHA-256(experiment_id ":" user_id)`, so any implementation computing it
//! assigns a user to the same variant.

use sha2::{Digest, Sha256};

/// Consistent hasher for experiment assignments
#[derive(Debug, Clone, Copy)]
pub struct ConsistentHasher;

impl ConsistentHasher {
    /// 64-bit stable hash of an (experiment, user) pair
    pub fn hash_assignment(experiment_id: &str, user_id: &str) -> u64 {
        let mut hasher = Sha256::new();
        hasher.update(experiment_id.as_bytes());
        hasher.update(b":");
        hasher.update(user_id.as_bytes());
        let digest = hasher.finalize();

        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&digest[..8]);
        u64::from_be_bytes(prefix)
    }

    /// Bucket in `0..total_weight`, or `None` when nothing carries weight
    pub fn bucket(experiment_id: &str, user_id: &str, total_weight: u64) -> Option<u64> {
        (total_weight > 0).then(|| Self::hash_assignment(experiment_id, user_id) % total_weight)
    }
}
