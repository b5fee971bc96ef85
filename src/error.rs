//! Error types for the sharded cache

use thiserror::Error;

use crate::cache::QueueError;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building or operating a cache
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid configuration, rejected at construction
    #[error("Configuration error: {0}")]
    Config(String),

    /// Key absent, deleted, evicted or shadowed by a fingerprint collision
    #[error("Entry not found")]
    EntryNotFound,

    /// Serialized entry is larger than the configured per-entry limit
    #[error("Entry of {size} bytes exceeds the maximum entry size of {max} bytes")]
    EntryTooLarge { size: usize, max: usize },

    /// Key does not fit the 16-bit key length field of the entry header
    #[error("Key of {len} bytes is longer than the supported maximum of 65535 bytes")]
    KeyTooLong { len: usize },

    /// Entry cannot fit in a shard even after evicting everything it holds
    #[error("Entry of {size} bytes cannot fit in a shard capped at {capacity} bytes")]
    EntryNotFit { size: usize, capacity: usize },

    /// Byte arena invariant violation
    #[error("Arena error: {0}")]
    Arena(#[from] QueueError),

    /// Iterator has no entry to return
    #[error("Iterator has no valid entry at its current position")]
    InvalidIteratorState,

    /// I/O error (thread spawn, settings file)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Settings file could not be parsed
    #[error("Failed to parse settings: {0}")]
    ConfigParse(#[from] serde_yaml::Error),

    /// JSON encoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Prometheus registry error
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True for the expected miss case, which callers usually treat as normal flow
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::EntryNotFound)
    }
}
