//! Entry Iterator
//!
//! Walks shards one at a time. Entering a shard snapshots its indexed
//! fingerprints under a read lock; every subsequent lookup re-reads the
//! entry under a fresh read lock and skips it if it was deleted, evicted
//! or has outlived the life window in the meantime.
//!
//! There is no isolation: concurrent writes may be skipped or observed with
//! a newer value. A fingerprint is visited at most once per pass, so a live
//! key is never returned twice.

use std::sync::Arc;

use bytes::Bytes;

use super::entry::EntryView;
use super::shard::CacheShard;
use crate::error::{Error, Result};

/// Owned copy of a cached entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo {
    timestamp: u64,
    fingerprint: u64,
    key: String,
    value: Bytes,
}

impl EntryInfo {
    pub(crate) fn from_view(view: &EntryView<'_>) -> Self {
        Self {
            timestamp: view.timestamp(),
            fingerprint: view.fingerprint(),
            key: String::from_utf8_lossy(view.key()).into_owned(),
            value: Bytes::copy_from_slice(view.value()),
        }
    }

    /// Insertion time in milliseconds since the Unix epoch
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// Key fingerprint
    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    /// Key, empty when the cache does not store keys
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Value bytes
    pub fn value(&self) -> &Bytes {
        &self.value
    }

    /// Split into key and value
    pub fn into_parts(self) -> (String, Bytes) {
        (self.key, self.value)
    }
}

/// Single-pass iterator over every live entry of a cache
pub struct EntryIterator<'a> {
    shards: &'a [Arc<CacheShard>],
    /// Shard whose fingerprints are loaded in `pending`
    shard_index: usize,
    pending: Vec<u64>,
    cursor: usize,
    current: Option<EntryInfo>,
    started: bool,
}

impl<'a> EntryIterator<'a> {
    pub(crate) fn new(shards: &'a [Arc<CacheShard>]) -> Self {
        Self {
            shards,
            shard_index: 0,
            pending: Vec::new(),
            cursor: 0,
            current: None,
            started: false,
        }
    }

    /// Advance to the next live entry. Returns `false` once every shard has
    /// been visited; an entry that fails to read is skipped.
    pub fn has_next(&mut self) -> bool {
        if self.current.is_some() {
            return true;
        }
        loop {
            if self.cursor >= self.pending.len() && !self.load_next_shard() {
                return false;
            }

            let fingerprint = self.pending[self.cursor];
            self.cursor += 1;

            match self.shards[self.shard_index].entry_info(fingerprint) {
                Ok(Some(info)) => {
                    self.current = Some(info);
                    return true;
                }
                Ok(None) => continue,
                Err(err) => {
                    tracing::warn!(
                        shard = self.shard_index,
                        fingerprint,
                        error = %err,
                        "Skipping unreadable entry"
                    );
                }
            }
        }
    }

    /// Return the entry at the cursor and move past it
    pub fn value(&mut self) -> Result<EntryInfo> {
        if !self.has_next() {
            return Err(Error::InvalidIteratorState);
        }
        self.current.take().ok_or(Error::InvalidIteratorState)
    }

    fn load_next_shard(&mut self) -> bool {
        loop {
            if self.started {
                self.shard_index += 1;
            }
            self.started = true;

            let Some(shard) = self.shards.get(self.shard_index) else {
                self.pending.clear();
                self.cursor = 0;
                self.shard_index = self.shards.len();
                return false;
            };
            self.pending = shard.fingerprints();
            self.cursor = 0;
            if !self.pending.is_empty() {
                return true;
            }
        }
    }
}

impl Iterator for EntryIterator<'_> {
    type Item = EntryInfo;

    fn next(&mut self) -> Option<EntryInfo> {
        self.value().ok()
    }
}
