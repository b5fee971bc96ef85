//! Sharded Cache
//!
//! Routes each key to one of a power-of-two number of shards by
//! `fingerprint & (shards - 1)`. Shards share nothing but the immutable
//! configuration, so operations on different shards never contend.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;

use super::cleaner::ExpiryDriver;
use super::config::Config;
use super::entry::{self, MAX_KEY_LEN};
use super::iterator::EntryIterator;
use super::shard::CacheShard;
use super::stats::Stats;
use crate::error::{Error, Result};

/// Sharded in-process byte cache
pub struct Cache {
    shards: Box<[Arc<CacheShard>]>,
    shard_mask: u64,
    config: Config,
    expiry: Mutex<Option<ExpiryDriver>>,
}

impl Cache {
    /// Validate `config`, allocate every shard and start background expiry
    /// when a life window is set
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let shards: Box<[Arc<CacheShard>]> = (0..config.shards)
            .map(|id| Arc::new(CacheShard::new(id, &config)))
            .collect();

        let expiry = if config.life_window > Duration::ZERO {
            Some(ExpiryDriver::spawn(&shards, config.effective_clean_interval())?)
        } else {
            None
        };

        tracing::debug!(
            shards = config.shards,
            life_window_ms = config.life_window_millis(),
            initial_shard_size = config.initial_shard_size(),
            max_shard_size = ?config.max_shard_size(),
            "Opened cache"
        );

        Ok(Self {
            shard_mask: (config.shards - 1) as u64,
            shards,
            config,
            expiry: Mutex::new(expiry),
        })
    }

    /// Store `value` under `key`, replacing any previous value
    pub fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        if key.len() > MAX_KEY_LEN {
            return Err(Error::KeyTooLong { len: key.len() });
        }

        let stored_key_len = if self.config.store_keys { key.len() } else { 0 };
        let size = entry::encoded_len(stored_key_len, value.len());
        let max = self.config.max_entry_size;
        if max > 0 && size > max {
            if self.config.enforce_max_entry_size {
                self.warn(|| format!("rejecting entry {:?}: {} bytes exceeds {} bytes", key, size, max));
                return Err(Error::EntryTooLarge { size, max });
            }
            self.warn(|| format!("entry {:?} of {} bytes exceeds max entry size {}", key, size, max));
        }

        let fingerprint = self.config.hasher.sum64(key.as_bytes());
        self.shard(fingerprint).set(fingerprint, key.as_bytes(), value)
    }

    /// Read the value stored under `key`.
    ///
    /// Expiry is lazy: an entry older than the life window is still
    /// returned until an eviction sweep (on insert or in the background)
    /// removes it.
    pub fn get(&self, key: &str) -> Result<Bytes> {
        let fingerprint = self.config.hasher.sum64(key.as_bytes());
        self.shard(fingerprint).get(fingerprint, key.as_bytes())
    }

    /// Remove `key`. Its bytes are reclaimed when the arena head passes them.
    pub fn delete(&self, key: &str) -> Result<()> {
        let fingerprint = self.config.hasher.sum64(key.as_bytes());
        self.shard(fingerprint).delete(fingerprint, key.as_bytes())
    }

    /// Number of reachable entries
    pub fn len(&self) -> u64 {
        self.shards.iter().map(|s| s.len() as u64).sum()
    }

    /// True when no entry is reachable
    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(|s| s.is_empty())
    }

    /// Arena bytes allocated across all shards
    pub fn capacity(&self) -> u64 {
        self.shards.iter().map(|s| s.capacity() as u64).sum()
    }

    /// Arena bytes held by live blocks across all shards
    pub fn used_bytes(&self) -> u64 {
        self.shards.iter().map(|s| s.used_bytes() as u64).sum()
    }

    /// Counters summed shard by shard
    pub fn stats(&self) -> Stats {
        self.shards.iter().map(|s| s.stats()).sum()
    }

    /// Fresh single-pass iterator over live entries
    pub fn iterator(&self) -> EntryIterator<'_> {
        EntryIterator::new(&self.shards)
    }

    /// Drop every entry, one shard at a time
    pub fn reset(&self) {
        for shard in self.shards.iter() {
            shard.reset();
        }
    }

    /// Stop background expiry. Safe to call more than once.
    pub fn close(&self) {
        // Taken out of the lock so a concurrent close returns immediately.
        let driver = self.expiry.lock().take();
        if let Some(mut driver) = driver {
            driver.shutdown();
        }
    }

    /// Number of shards
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Configuration the cache was opened with
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[inline]
    pub(crate) fn shard_index(&self, fingerprint: u64) -> usize {
        (fingerprint & self.shard_mask) as usize
    }

    #[inline]
    fn shard(&self, fingerprint: u64) -> &CacheShard {
        &self.shards[self.shard_index(fingerprint)]
    }

    fn warn(&self, message: impl FnOnce() -> String) {
        if self.config.verbose {
            self.config.logger.warn(&message());
        }
    }
}

impl Drop for Cache {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Cache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache")
            .field("shards", &self.shards.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Tests
// =============================================================================
