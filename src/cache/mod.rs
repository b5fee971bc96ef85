//! Sharded Byte Cache
//!
//! An in-process key/value cache for string keys and byte values that keeps
//! entries in large per-shard byte arenas instead of individual heap
//! objects.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                              Cache                               │
//! │        fingerprint = hasher(key), shard = fingerprint & mask     │
//! ├──────────────────────┬──────────────────────┬────────────────────┤
//! │  Shard 0             │  Shard 1             │  Shard N-1         │
//! │  ┌────────────────┐  │  ┌────────────────┐  │                    │
//! │  │ index          │  │  │ index          │  │        ...         │
//! │  │ fp -> offset   │  │  │ fp -> offset   │  │                    │
//! │  ├────────────────┤  │  ├────────────────┤  │                    │
//! │  │ BytesQueue     │  │  │ BytesQueue     │  │                    │
//! │  │ (FIFO arena)   │  │  │ (FIFO arena)   │  │                    │
//! │  └────────────────┘  │  └────────────────┘  │                    │
//! ├──────────────────────┴──────────────────────┴────────────────────┤
//! │           Expiry driver (one sweeper thread per shard)           │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Design Principles
//!
//! - Power-of-two shard count so routing is a bitwise AND
//! - Entries are serialized into the arena in insertion order, so the
//!   oldest entry is always at the queue head
//! - Expiry is lazy: reads never check age, evictions pop from the head
//! - Deleted and overwritten entries are unlinked from the index and their
//!   bytes reclaimed when the head passes them

mod cleaner;
mod clock;
mod config;
mod entry;
mod hash;
mod iterator;
mod logger;
mod queue;
mod shard;
mod sharded;
mod stats;

#[cfg(test)]
mod proptest;

use std::time::Duration;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{CacheSettings, Config};
pub use entry::{ENTRY_HEADER_SIZE, MAX_KEY_LEN};
pub use hash::{Fnv64a, Hasher, Xxh3Hasher};
pub use iterator::{EntryInfo, EntryIterator};
pub use logger::{Logger, NopLogger, TracingLogger};
pub use queue::{BytesQueue, Pushed, QueueError, Relocation, BLOCK_HEADER_SIZE};
pub use sharded::Cache;
pub use stats::Stats;

/// Default number of shards
pub const DEFAULT_SHARDS: usize = 1024;

/// Shortest background sweep period
pub const MIN_CLEAN_INTERVAL: Duration = Duration::from_secs(1);

/// Floor for the per-shard pre-sizing estimate
pub const MIN_ENTRIES_PER_SHARD: usize = 10;

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_shards_is_power_of_two() {
        // Routing masks the fingerprint with DEFAULT_SHARDS - 1
        assert!(DEFAULT_SHARDS.is_power_of_two());
        assert_eq!(DEFAULT_SHARDS, 1024);
    }

    #[test]
    fn test_clean_interval_floor() {
        assert_eq!(MIN_CLEAN_INTERVAL, Duration::from_secs(1));
    }

    #[test]
    fn test_entry_overhead() {
        // 8-byte timestamp, 8-byte fingerprint, 2-byte key length
        assert_eq!(ENTRY_HEADER_SIZE, 18);
        assert_eq!(BLOCK_HEADER_SIZE, 4);
    }
}
