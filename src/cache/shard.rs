//! Cache Shard
//!
//! One independently locked slice of the keyspace: a byte queue holding
//! serialized entries plus an index from fingerprint to queue offset.
//!
//! # Design
//!
//! - One RwLock per shard; gets share it, sets and deletes take it exclusively
//! - Expired entries are popped from the queue head before every insert
//! - Deletes and non-matching overwrites only unlink the index entry; the
//!   bytes are reclaimed once the head passes them
//! - Counters live outside the lock on their own cache line

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use crossbeam::utils::CachePadded;
use parking_lot::RwLock;

use super::clock::Clock;
use super::config::Config;
use super::entry::{self, EntryView};
use super::iterator::EntryInfo;
use super::logger::Logger;
use super::queue::{BytesQueue, QueueError};
use super::stats::{ShardStats, Stats};
use crate::error::{Error, Result};

/// State guarded by the shard lock
struct ShardInner {
    /// Fingerprint to queue offset of the live entry
    index: HashMap<u64, usize>,
    /// Serialized entries
    queue: BytesQueue,
    /// Reusable serialization buffer
    scratch: Vec<u8>,
}

impl ShardInner {
    /// Pop the head entry, unlinking it if the index still points at it
    fn evict_head(&mut self) -> Result<()> {
        let (offset, block) = self.queue.pop()?;
        let fingerprint = EntryView::parse(block)
            .ok_or(QueueError::Corrupted { offset })?
            .fingerprint();
        if self.index.get(&fingerprint) == Some(&offset) {
            self.index.remove(&fingerprint);
        }
        Ok(())
    }

    /// Pop head entries older than `life_window_ms`
    fn evict_expired(&mut self, now: u64, life_window_ms: u64) -> Result<u64> {
        let mut evicted = 0;
        while let Some(offset) = self.queue.head_offset() {
            let block = self.queue.peek(offset)?;
            let view = EntryView::parse(block).ok_or(QueueError::Corrupted { offset })?;
            if view.age_millis(now) <= life_window_ms {
                break;
            }
            self.evict_head()?;
            evicted += 1;
        }
        Ok(evicted)
    }
}

/// Single cache shard
pub struct CacheShard {
    id: usize,
    inner: RwLock<ShardInner>,
    stats: CachePadded<ShardStats>,
    /// Zero disables expiry
    life_window_ms: u64,
    store_keys: bool,
    verbose: bool,
    logger: Arc<dyn Logger>,
    clock: Arc<dyn Clock>,
}

impl CacheShard {
    /// Create an empty shard sized from `config`
    pub fn new(id: usize, config: &Config) -> Self {
        Self {
            id,
            inner: RwLock::new(ShardInner {
                index: HashMap::with_capacity(config.initial_entries_per_shard()),
                queue: BytesQueue::new(config.initial_shard_size(), config.max_shard_size()),
                scratch: Vec::with_capacity(config.max_entry_size),
            }),
            stats: CachePadded::new(ShardStats::new()),
            life_window_ms: config.life_window_millis(),
            store_keys: config.store_keys,
            verbose: config.verbose,
            logger: Arc::clone(&config.logger),
            clock: Arc::clone(&config.clock),
        }
    }

    /// Shard position within the cache
    pub fn id(&self) -> usize {
        self.id
    }

    /// Entry lifetime; zero when expiry is disabled
    pub fn life_window(&self) -> Duration {
        Duration::from_millis(self.life_window_ms)
    }

    /// Store `value` under `key`
    pub fn set(&self, fingerprint: u64, key: &[u8], value: &[u8]) -> Result<()> {
        let now = self.clock.now_millis();
        let stored_key = self.stored_key(key);
        let size = entry::encoded_len(stored_key.len(), value.len());

        let mut guard = self.inner.write();
        let inner = &mut *guard;

        // Same key, same length: rewrite the bytes where they are.
        if let Some(&offset) = inner.index.get(&fingerprint) {
            let block = inner.queue.peek_mut(offset)?;
            let reusable = block.len() == size
                && EntryView::parse(block).is_some_and(|view| view.key() == stored_key);
            if reusable {
                entry::overwrite(block, now, fingerprint, stored_key, value);
                return Ok(());
            }
        }

        let mut evicted = 0;
        let result = self.insert_locked(inner, now, fingerprint, stored_key, value, &mut evicted);
        self.stats.record_evictions(evicted);
        result
    }

    fn insert_locked(
        &self,
        inner: &mut ShardInner,
        now: u64,
        fingerprint: u64,
        stored_key: &[u8],
        value: &[u8],
        evicted: &mut u64,
    ) -> Result<()> {
        if self.life_window_ms > 0 {
            *evicted += inner.evict_expired(now, self.life_window_ms)?;
        }

        entry::encode_into(&mut inner.scratch, now, fingerprint, stored_key, value);

        let pushed = loop {
            match inner.queue.push(&inner.scratch) {
                Ok(pushed) => break pushed,
                Err(QueueError::Full { capacity, .. }) if inner.queue.is_empty() => {
                    self.warn(|| {
                        format!(
                            "shard {}: entry of {} bytes cannot fit in {} bytes",
                            self.id,
                            inner.scratch.len(),
                            capacity
                        )
                    });
                    return Err(Error::EntryNotFit {
                        size: inner.scratch.len(),
                        capacity,
                    });
                }
                Err(QueueError::Full { .. }) => {
                    if *evicted == 0 {
                        self.warn(|| {
                            format!(
                                "shard {}: evicting under memory pressure to fit {} bytes",
                                self.id,
                                inner.scratch.len()
                            )
                        });
                    }
                    inner.evict_head()?;
                    *evicted += 1;
                }
                Err(err) => return Err(err.into()),
            }
        };

        if let Some(relocation) = pushed.relocation {
            for offset in inner.index.values_mut() {
                *offset = relocation.apply(*offset);
            }
        }
        inner.index.insert(fingerprint, pushed.offset);

        Ok(())
    }

    /// Read the value stored under `key`.
    ///
    /// No age check happens here: an entry past its life window stays
    /// readable until an eviction sweep pops it.
    pub fn get(&self, fingerprint: u64, key: &[u8]) -> Result<Bytes> {
        let guard = self.inner.read();

        let Some(&offset) = guard.index.get(&fingerprint) else {
            self.stats.record_miss();
            return Err(Error::EntryNotFound);
        };

        let block = guard.queue.peek(offset)?;
        let view = EntryView::parse(block).ok_or(QueueError::Corrupted { offset })?;

        if view.fingerprint() != fingerprint {
            self.stats.record_miss();
            return Err(Error::EntryNotFound);
        }
        if self.store_keys && view.key() != key {
            self.stats.record_collision();
            self.warn(|| {
                format!(
                    "collision detected: {:?} and {:?} share fingerprint {:#x}",
                    String::from_utf8_lossy(key),
                    String::from_utf8_lossy(view.key()),
                    fingerprint
                )
            });
            return Err(Error::EntryNotFound);
        }

        self.stats.record_hit();
        Ok(Bytes::copy_from_slice(view.value()))
    }

    /// Unlink the entry stored under `key`
    pub fn delete(&self, fingerprint: u64, key: &[u8]) -> Result<()> {
        let mut guard = self.inner.write();
        let inner = &mut *guard;

        let Some(&offset) = inner.index.get(&fingerprint) else {
            self.stats.record_del_miss();
            return Err(Error::EntryNotFound);
        };

        if self.store_keys {
            let block = inner.queue.peek(offset)?;
            let view = EntryView::parse(block).ok_or(QueueError::Corrupted { offset })?;
            if view.key() != key {
                self.stats.record_del_miss();
                return Err(Error::EntryNotFound);
            }
        }

        inner.index.remove(&fingerprint);
        self.stats.record_del_hit();
        Ok(())
    }

    /// Pop every expired entry from the head; returns how many were evicted
    pub fn cleanup(&self) -> Result<u64> {
        if self.life_window_ms == 0 {
            return Ok(0);
        }
        let now = self.clock.now_millis();
        let evicted = self.inner.write().evict_expired(now, self.life_window_ms)?;
        self.stats.record_evictions(evicted);
        Ok(evicted)
    }

    /// Age of the entry at the queue head
    pub fn oldest_entry_age(&self) -> Option<Duration> {
        let now = self.clock.now_millis();
        let guard = self.inner.read();
        let block = guard.queue.peek_head().ok()?;
        EntryView::parse(block).map(|view| Duration::from_millis(view.age_millis(now)))
    }

    /// Snapshot of the indexed fingerprints
    pub fn fingerprints(&self) -> Vec<u64> {
        self.inner.read().index.keys().copied().collect()
    }

    /// Live, unexpired entry for `fingerprint`, if any
    pub fn entry_info(&self, fingerprint: u64) -> Result<Option<EntryInfo>> {
        let guard = self.inner.read();
        let Some(&offset) = guard.index.get(&fingerprint) else {
            return Ok(None);
        };

        let block = guard.queue.peek(offset)?;
        let view = EntryView::parse(block).ok_or(QueueError::Corrupted { offset })?;
        if self.life_window_ms > 0 && view.age_millis(self.clock.now_millis()) > self.life_window_ms
        {
            return Ok(None);
        }

        Ok(Some(EntryInfo::from_view(&view)))
    }

    /// Drop every entry, keeping the arena allocation
    pub fn reset(&self) {
        let mut guard = self.inner.write();
        guard.index.clear();
        guard.queue.reset();
    }

    /// Number of reachable entries
    pub fn len(&self) -> usize {
        self.inner.read().index.len()
    }

    /// True when no entry is reachable
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Arena bytes allocated
    pub fn capacity(&self) -> usize {
        self.inner.read().queue.capacity()
    }

    /// Arena bytes held by live blocks, orphaned ones included
    pub fn used_bytes(&self) -> usize {
        self.inner.read().queue.used_bytes()
    }

    /// Counter snapshot
    pub fn stats(&self) -> Stats {
        self.stats.snapshot()
    }

    #[inline]
    fn stored_key<'k>(&self, key: &'k [u8]) -> &'k [u8] {
        if self.store_keys {
            key
        } else {
            &[]
        }
    }

    fn warn(&self, message: impl FnOnce() -> String) {
        if self.verbose {
            self.logger.warn(&message());
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
