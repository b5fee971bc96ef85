//! Cache Configuration
//!
//! `Config` is immutable once handed to [`Cache::new`](super::Cache::new),
//! which validates it exactly once. `CacheSettings` is the serializable
//! mirror used for settings files and the command line.

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::clock::{Clock, SystemClock};
use super::hash::{Fnv64a, Hasher, Xxh3Hasher};
use super::logger::{Logger, TracingLogger};
use super::{DEFAULT_SHARDS, MIN_CLEAN_INTERVAL, MIN_ENTRIES_PER_SHARD};
use crate::error::{Error, Result};

/// Cache configuration
#[derive(Clone)]
pub struct Config {
    /// Number of shards, a positive power of two
    pub shards: usize,
    /// Age after which an entry becomes eligible for eviction; zero disables expiry
    pub life_window: Duration,
    /// Period of the background expiry sweep, clamped to `MIN_CLEAN_INTERVAL`
    pub clean_interval: Duration,
    /// Expected entries within one life window, used only to pre-size shards
    pub max_entries_in_window: usize,
    /// Expected serialized entry size in bytes, used to pre-size shards
    pub max_entry_size: usize,
    /// Reject entries larger than `max_entry_size` instead of warning
    pub enforce_max_entry_size: bool,
    /// Send diagnostics to `logger`
    pub verbose: bool,
    /// Total arena ceiling in bytes across all shards; zero means unbounded
    pub hard_max_cache_size: u64,
    /// Keep key bytes in each entry for exact-match verification.
    ///
    /// When disabled, lookups trust the 64-bit fingerprint alone: entries
    /// are smaller, but two keys with the same fingerprint alias each
    /// other and iteration yields empty keys.
    pub store_keys: bool,
    /// Fingerprint function
    pub hasher: Arc<dyn Hasher>,
    /// Diagnostic sink
    pub logger: Arc<dyn Logger>,
    /// Time source for entry timestamps
    pub clock: Arc<dyn Clock>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            shards: DEFAULT_SHARDS,
            life_window: Duration::from_secs(10 * 60),
            clean_interval: Duration::from_secs(1),
            max_entries_in_window: 1000 * 10 * 60,
            max_entry_size: 500,
            enforce_max_entry_size: false,
            verbose: true,
            hard_max_cache_size: 0,
            store_keys: true,
            hasher: Arc::new(Fnv64a),
            logger: Arc::new(TracingLogger),
            clock: Arc::new(SystemClock),
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("shards", &self.shards)
            .field("life_window", &self.life_window)
            .field("clean_interval", &self.clean_interval)
            .field("max_entries_in_window", &self.max_entries_in_window)
            .field("max_entry_size", &self.max_entry_size)
            .field("enforce_max_entry_size", &self.enforce_max_entry_size)
            .field("verbose", &self.verbose)
            .field("hard_max_cache_size", &self.hard_max_cache_size)
            .field("store_keys", &self.store_keys)
            .finish_non_exhaustive()
    }
}

impl Config {
    /// Defaults with the given shard count and life window
    pub fn new(shards: usize, life_window: Duration) -> Self {
        Self {
            shards,
            life_window,
            ..Default::default()
        }
    }

    /// Check invariants that cannot be expressed in the types
    pub fn validate(&self) -> Result<()> {
        if self.shards == 0 || !self.shards.is_power_of_two() {
            return Err(Error::Config(format!(
                "shard count must be a positive power of two, got {}",
                self.shards
            )));
        }
        if self.hard_max_cache_size > 0 && self.hard_max_cache_size < self.shards as u64 {
            return Err(Error::Config(format!(
                "hard max cache size of {} bytes leaves nothing for {} shards",
                self.hard_max_cache_size, self.shards
            )));
        }
        Ok(())
    }

    /// Entries each shard index is pre-sized for
    pub fn initial_entries_per_shard(&self) -> usize {
        (self.max_entries_in_window / self.shards).max(MIN_ENTRIES_PER_SHARD)
    }

    /// Arena bytes each shard starts with
    pub fn initial_shard_size(&self) -> usize {
        let size = self
            .initial_entries_per_shard()
            .saturating_mul(self.max_entry_size);
        match self.max_shard_size() {
            Some(max) => size.min(max),
            None => size,
        }
    }

    /// Per-shard arena ceiling, if the cache is bounded
    pub fn max_shard_size(&self) -> Option<usize> {
        (self.hard_max_cache_size > 0)
            .then(|| (self.hard_max_cache_size / self.shards as u64) as usize)
    }

    /// Life window in whole milliseconds, rounded up so any nonzero window
    /// stays nonzero
    pub fn life_window_millis(&self) -> u64 {
        let nanos = self.life_window.as_nanos().div_ceil(1_000_000);
        u64::try_from(nanos).unwrap_or(u64::MAX)
    }

    /// Background sweep period after clamping
    pub fn effective_clean_interval(&self) -> Duration {
        self.clean_interval.max(MIN_CLEAN_INTERVAL)
    }
}

// =============================================================================
// Serializable settings
// =============================================================================

/// Scalar cache settings as read from a YAML file or command line.
///
/// Durations are signed seconds so that a negative life window can be
/// reported instead of silently failing to parse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheSettings {
    pub shards: usize,
    pub life_window_secs: i64,
    pub clean_interval_secs: i64,
    pub max_entries_in_window: usize,
    pub max_entry_size: usize,
    pub enforce_max_entry_size: bool,
    pub verbose: bool,
    pub hard_max_cache_size: u64,
    pub store_keys: bool,
    /// Use a seeded XXH3 hasher instead of FNV-1a
    pub hash_seed: Option<u64>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        let config = Config::default();
        Self {
            shards: config.shards,
            life_window_secs: config.life_window.as_secs() as i64,
            clean_interval_secs: config.clean_interval.as_secs() as i64,
            max_entries_in_window: config.max_entries_in_window,
            max_entry_size: config.max_entry_size,
            enforce_max_entry_size: config.enforce_max_entry_size,
            verbose: config.verbose,
            hard_max_cache_size: config.hard_max_cache_size,
            store_keys: config.store_keys,
            hash_seed: None,
        }
    }
}

impl CacheSettings {
    /// Parse settings from YAML
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Read settings from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&raw)
    }

    /// Build a `Config`, rejecting negative durations
    pub fn into_config(self) -> Result<Config> {
        let life_window = non_negative_secs("life window", self.life_window_secs)?;
        let clean_interval = non_negative_secs("clean interval", self.clean_interval_secs)?;

        let hasher: Arc<dyn Hasher> = match self.hash_seed {
            Some(seed) => Arc::new(Xxh3Hasher::with_seed(seed)),
            None => Arc::new(Fnv64a),
        };

        Ok(Config {
            shards: self.shards,
            life_window,
            clean_interval,
            max_entries_in_window: self.max_entries_in_window,
            max_entry_size: self.max_entry_size,
            enforce_max_entry_size: self.enforce_max_entry_size,
            verbose: self.verbose,
            hard_max_cache_size: self.hard_max_cache_size,
            store_keys: self.store_keys,
            hasher,
            ..Default::default()
        })
    }
}

fn non_negative_secs(name: &str, secs: i64) -> Result<Duration> {
    u64::try_from(secs)
        .map(Duration::from_secs)
        .map_err(|_| Error::Config(format!("{} must not be negative, got {}s", name, secs)))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.shards, 1024);
        assert_eq!(config.max_shard_size(), None);
    }

    #[test]
    fn test_life_window_rounds_up_to_millis() {
        assert_eq!(Config::new(1, Duration::ZERO).life_window_millis(), 0);
        assert_eq!(Config::new(1, Duration::from_nanos(1)).life_window_millis(), 1);
        assert_eq!(Config::new(1, Duration::from_micros(500)).life_window_millis(), 1);
        assert_eq!(Config::new(1, Duration::from_millis(1500)).life_window_millis(), 1500);
        assert_eq!(Config::new(1, Duration::from_micros(1500)).life_window_millis(), 2);
        assert_eq!(Config::new(1, Duration::MAX).life_window_millis(), u64::MAX);
    }

    #[test]
    fn test_rejects_bad_shard_counts() {
        for shards in [0, 3, 6, 1000] {
            let config = Config::new(shards, Duration::from_secs(1));
            assert_matches!(config.validate(), Err(Error::Config(_)), "shards = {}", shards);
        }
        for shards in [1, 2, 64, 8192] {
            assert!(Config::new(shards, Duration::ZERO).validate().is_ok());
        }
    }

    #[test]
    fn test_rejects_cap_smaller_than_shard_count() {
        let mut config = Config::new(16, Duration::ZERO);
        config.hard_max_cache_size = 8;
        assert_matches!(config.validate(), Err(Error::Config(_)));
    }

    #[test]
    fn test_shard_sizing() {
        let mut config = Config::new(4, Duration::ZERO);
        config.max_entries_in_window = 400;
        config.max_entry_size = 256;
        assert_eq!(config.initial_entries_per_shard(), 100);
        assert_eq!(config.initial_shard_size(), 25_600);

        config.hard_max_cache_size = 40_000;
        assert_eq!(config.max_shard_size(), Some(10_000));
        assert_eq!(config.initial_shard_size(), 10_000);

        config.max_entries_in_window = 0;
        assert_eq!(config.initial_entries_per_shard(), MIN_ENTRIES_PER_SHARD);
    }

    #[test]
    fn test_clean_interval_is_clamped() {
        let mut config = Config::default();
        config.clean_interval = Duration::from_millis(10);
        assert_eq!(config.effective_clean_interval(), MIN_CLEAN_INTERVAL);

        config.clean_interval = Duration::from_secs(30);
        assert_eq!(config.effective_clean_interval(), Duration::from_secs(30));
    }

    #[test]
    fn test_settings_from_yaml() {
        let settings = CacheSettings::from_yaml_str(
            "shards: 8\nlife_window_secs: 30\nhard_max_cache_size: 8192\nhash_seed: 7\n",
        )
        .unwrap();
        assert_eq!(settings.shards, 8);
        assert_eq!(settings.max_entry_size, 500);

        let config = settings.into_config().unwrap();
        assert_eq!(config.life_window, Duration::from_secs(30));
        assert_eq!(config.max_shard_size(), Some(1024));
        assert_eq!(
            config.hasher.sum64(b"k"),
            Xxh3Hasher::with_seed(7).sum64(b"k")
        );
    }

    #[test]
    fn test_settings_reject_negative_life_window() {
        let settings = CacheSettings {
            life_window_secs: -5,
            ..Default::default()
        };
        assert_matches!(settings.into_config(), Err(Error::Config(msg)) if msg.contains("life window"));
    }

    #[test]
    fn test_settings_reject_unknown_fields() {
        assert_matches!(
            CacheSettings::from_yaml_str("shardz: 4\n"),
            Err(Error::ConfigParse(_))
        );
    }

    #[test]
    fn test_debug_omits_collaborators() {
        let rendered = format!("{:?}", Config::default());
        assert!(rendered.contains("shards: 1024"));
        assert!(!rendered.contains("hasher"));
    }
}
