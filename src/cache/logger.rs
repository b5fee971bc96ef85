//! Diagnostic sink for verbose cache warnings
//!
//! The cache only calls into the logger when `Config::verbose` is set.

/// Receiver of cache warnings such as oversized entries or eviction pressure
pub trait Logger: Send + Sync {
    /// Record a warning
    fn warn(&self, message: &str);
}

/// Forwards warnings to `tracing` under the `shardcache` target
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn warn(&self, message: &str) {
        tracing::warn!(target: "shardcache", "{}", message);
    }
}

/// Discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NopLogger;

impl Logger for NopLogger {
    fn warn(&self, _message: &str) {}
}
