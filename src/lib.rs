//! shardcache - Sharded In-Process Byte Cache
//!
//! A concurrent key/value cache for string keys and byte values, designed to
//! hold millions of entries with a small number of large allocations.
//!
//! # Architecture
//!
//! ```text
//! key ─▶ Hasher ─▶ fingerprint ─▶ shard (fingerprint & (N-1))
//!                                   │
//!                                   ├─ index: fingerprint → arena offset
//!                                   └─ arena: FIFO ring of serialized entries
//! ```
//!
//! Entries older than the life window are evicted lazily: on every insert
//! into their shard and by a background sweep that runs once per clean
//! interval. Reads never check age.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use shardcache::{Cache, Config};
//!
//! let cache = Cache::new(Config::new(1024, Duration::from_secs(600)))?;
//! cache.set("session:42", b"payload")?;
//! assert_eq!(cache.get("session:42")?.as_ref(), b"payload");
//! cache.close();
//! # Ok::<(), shardcache::Error>(())
//! ```
//!
//! # Modules
//!
//! - [`cache`] - Sharded cache, byte arena, expiry and iteration
//! - [`error`] - Error types
//! - [`monitoring`] - Prometheus export of cache statistics

pub mod cache;
pub mod error;
pub mod monitoring;

// Re-export commonly used types
pub use cache::{Cache, CacheSettings, Config, EntryInfo, EntryIterator, Stats};
pub use error::{Error, Result};
