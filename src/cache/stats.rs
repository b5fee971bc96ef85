//! Cache Statistics
//!
//! Each shard owns a block of relaxed atomic counters. The cache aggregates
//! them shard by shard on demand, so a snapshot is not globally consistent.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Counters owned by a single shard
#[derive(Debug, Default)]
pub struct ShardStats {
    hits: AtomicU64,
    misses: AtomicU64,
    collisions: AtomicU64,
    del_hits: AtomicU64,
    del_misses: AtomicU64,
    evictions: AtomicU64,
}

impl ShardStats {
    /// Create zeroed counters
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_collision(&self) {
        self.collisions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_del_hit(&self) {
        self.del_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_del_miss(&self) {
        self.del_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_evictions(&self, n: u64) {
        if n > 0 {
            self.evictions.fetch_add(n, Ordering::Relaxed);
        }
    }

    /// Point-in-time copy of the counters
    pub fn snapshot(&self) -> Stats {
        Stats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            collisions: self.collisions.load(Ordering::Relaxed),
            del_hits: self.del_hits.load(Ordering::Relaxed),
            del_misses: self.del_misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

/// Aggregated cache statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    /// Successful gets
    pub hits: u64,
    /// Gets that found nothing
    pub misses: u64,
    /// Gets whose fingerprint matched an entry stored under another key
    pub collisions: u64,
    /// Deletes that removed an entry
    pub del_hits: u64,
    /// Deletes of absent keys
    pub del_misses: u64,
    /// Entries popped from arena heads by expiry or memory pressure
    pub evictions: u64,
}

impl Stats {
    /// Hits over total lookups, 0.0 before any lookup
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

impl std::ops::AddAssign for Stats {
    fn add_assign(&mut self, other: Self) {
        self.hits += other.hits;
        self.misses += other.misses;
        self.collisions += other.collisions;
        self.del_hits += other.del_hits;
        self.del_misses += other.del_misses;
        self.evictions += other.evictions;
    }
}

impl std::iter::Sum for Stats {
    fn sum<I: Iterator<Item = Stats>>(iter: I) -> Self {
        iter.fold(Stats::default(), |mut acc, s| {
            acc += s;
            acc
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
