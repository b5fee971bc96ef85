//! Key Fingerprinting
//!
//! Maps key bytes to the 64-bit fingerprint used for shard routing and the
//! per-shard index. Implementations must be pure functions of their input
//! for the lifetime of a cache; `DefaultHasher` is not used because its
//! output is not stable.

use std::fmt;

/// Pluggable fingerprint function shared read-only by every shard
pub trait Hasher: Send + Sync {
    /// Hash key bytes into a 64-bit fingerprint
    fn sum64(&self, key: &[u8]) -> u64;
}

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// FNV-1a, 64-bit. Unseeded and allocation-free; the default hasher.
#[derive(Debug, Clone, Copy, Default)]
pub struct Fnv64a;

impl Fnv64a {
    /// Create a new FNV-1a hasher
    pub fn new() -> Self {
        Self
    }
}

impl Hasher for Fnv64a {
    #[inline]
    fn sum64(&self, key: &[u8]) -> u64 {
        let mut hash = FNV_OFFSET_BASIS;
        for &byte in key {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(FNV_PRIME);
        }
        hash
    }
}

/// Seeded XXH3 hasher for callers that want per-process fingerprints
#[derive(Clone, Copy, Default)]
pub struct Xxh3Hasher {
    seed: u64,
}

impl Xxh3Hasher {
    /// Create a hasher with the given seed
    pub fn with_seed(seed: u64) -> Self {
        Self { seed }
    }

    /// Seed in use
    pub fn seed(&self) -> u64 {
        self.seed
    }
}

impl fmt::Debug for Xxh3Hasher {
    // The seed is kept out of logs.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Xxh3Hasher").finish_non_exhaustive()
    }
}

impl Hasher for Xxh3Hasher {
    #[inline]
    fn sum64(&self, key: &[u8]) -> u64 {
        xxhash_rust::xxh3::xxh3_64_with_seed(key, self.seed)
    }
}

// =============================================================================
// Tests
// =============================================================================
