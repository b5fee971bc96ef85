//! Background Expiry
//!
//! One thread per shard wakes every clean interval and pops expired entries
//! from that shard's queue head, so expiry progresses on shards that stop
//! receiving writes. Every thread watches a shared stop channel; dropping
//! its sender wakes them all, and `shutdown` joins each one.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, Sender};

use super::shard::CacheShard;
use crate::error::Result;

/// Owner of the per-shard expiry threads
pub(crate) struct ExpiryDriver {
    stop: Option<Sender<()>>,
    workers: Vec<JoinHandle<()>>,
}

impl ExpiryDriver {
    /// Start one sweeper per shard
    pub fn spawn(shards: &[Arc<CacheShard>], interval: Duration) -> Result<Self> {
        let (stop_tx, stop_rx) = channel::bounded::<()>(0);
        let mut driver = Self {
            stop: Some(stop_tx),
            workers: Vec::with_capacity(shards.len()),
        };

        for shard in shards {
            let shard = Arc::clone(shard);
            let stop = stop_rx.clone();
            let spawned = thread::Builder::new()
                .name(format!("shardcache-expiry-{}", shard.id()))
                .spawn(move || sweep_loop(&shard, interval, &stop));

            match spawned {
                Ok(handle) => driver.workers.push(handle),
                Err(err) => {
                    // Already running threads are stopped before reporting.
                    driver.shutdown();
                    return Err(err.into());
                }
            }
        }

        tracing::debug!(
            shards = shards.len(),
            interval_ms = interval.as_millis() as u64,
            "Started expiry drivers"
        );
        Ok(driver)
    }

    /// Signal every sweeper and wait for it to exit. Idempotent.
    pub fn shutdown(&mut self) {
        let Some(stop) = self.stop.take() else {
            return;
        };
        drop(stop);

        let workers = std::mem::take(&mut self.workers);
        let count = workers.len();
        for handle in workers {
            if handle.join().is_err() {
                tracing::error!("Expiry driver panicked");
            }
        }
        tracing::debug!(workers = count, "Stopped expiry drivers");
    }
}

impl Drop for ExpiryDriver {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn sweep_loop(shard: &CacheShard, interval: Duration, stop: &Receiver<()>) {
    let ticker = channel::tick(interval);
    loop {
        crossbeam::select! {
            // Only ever disconnects; nothing is sent.
            recv(stop) -> _ => break,
            recv(ticker) -> _ => match sweep(shard) {
                Ok(0) => {}
                Ok(evicted) => {
                    tracing::trace!(shard = shard.id(), evicted, "Expired entries evicted");
                }
                Err(err) => {
                    tracing::error!(shard = shard.id(), error = %err, "Expiry sweep failed");
                }
            },
        }
    }
}

/// Evict expired entries, taking the write lock only when the head is stale
fn sweep(shard: &CacheShard) -> Result<u64> {
    match shard.oldest_entry_age() {
        Some(age) if age > shard.life_window() => shard.cleanup(),
        _ => Ok(0),
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::clock::{Clock, ManualClock};
    use crate::cache::config::Config;

    #[test]
    fn test_shutdown_joins_all_workers() {
        let mut config = Config::new(4, Duration::from_secs(60));
        config.max_entries_in_window = 40;
        let shards: Vec<Arc<CacheShard>> = (0..4)
            .map(|id| Arc::new(CacheShard::new(id, &config)))
            .collect();

        let mut driver = ExpiryDriver::spawn(&shards, Duration::from_secs(3600)).unwrap();
        assert_eq!(driver.workers.len(), 4);

        driver.shutdown();
        assert!(driver.workers.is_empty());
        // Sweepers released their shard handles.
        assert!(shards.iter().all(|s| Arc::strong_count(s) == 1));

        driver.shutdown();
    }

    #[test]
    fn test_sweep_skips_shard_with_fresh_head() {
        let clock = Arc::new(ManualClock::new(1_700_000_000_000));
        let mut config = Config::new(1, Duration::from_secs(10));
        config.max_entries_in_window = 10;
        config.clock = Arc::clone(&clock) as Arc<dyn Clock>;
        let shard = CacheShard::new(0, &config);

        assert_eq!(sweep(&shard).unwrap(), 0);

        shard.set(1, b"a", b"first").unwrap();
        clock.advance(Duration::from_secs(5));
        shard.set(2, b"b", b"second").unwrap();

        // Exactly at the window is still live.
        clock.advance(Duration::from_secs(5));
        assert_eq!(sweep(&shard).unwrap(), 0);
        assert_eq!(shard.len(), 2);

        clock.advance(Duration::from_millis(1));
        assert_eq!(sweep(&shard).unwrap(), 1);
        assert_eq!(shard.len(), 1);
        assert_eq!(shard.stats().evictions, 1);
    }
}
