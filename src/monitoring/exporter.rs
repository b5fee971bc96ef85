//! Prometheus Stats Exporter

use prometheus::{Encoder, IntGauge, Opts, Registry, TextEncoder};

use crate::cache::{Cache, Stats};
use crate::error::{Error, Result};

/// Prefix of every exported metric name
pub const METRIC_NAMESPACE: &str = "shardcache";

/// Cache gauges registered in a private registry.
///
/// Counters are exported as gauges because each update copies an
/// aggregated snapshot rather than incrementing.
pub struct StatsExporter {
    registry: Registry,
    hits: IntGauge,
    misses: IntGauge,
    collisions: IntGauge,
    del_hits: IntGauge,
    del_misses: IntGauge,
    evictions: IntGauge,
    entries: IntGauge,
    capacity_bytes: IntGauge,
}

impl StatsExporter {
    /// Create and register every gauge
    pub fn new() -> Result<Self> {
        let registry = Registry::new();
        let gauge = |name: &str, help: &str| -> Result<IntGauge> {
            let gauge = IntGauge::with_opts(Opts::new(name, help).namespace(METRIC_NAMESPACE))?;
            registry.register(Box::new(gauge.clone()))?;
            Ok(gauge)
        };

        Ok(Self {
            hits: gauge("hits_total", "Successful gets")?,
            misses: gauge("misses_total", "Gets that found nothing")?,
            collisions: gauge("collisions_total", "Gets rejected by key verification")?,
            del_hits: gauge("delete_hits_total", "Deletes that removed an entry")?,
            del_misses: gauge("delete_misses_total", "Deletes of absent keys")?,
            evictions: gauge("evictions_total", "Entries evicted by expiry or memory pressure")?,
            entries: gauge("entries", "Reachable entries")?,
            capacity_bytes: gauge("capacity_bytes", "Arena bytes allocated")?,
            registry,
        })
    }

    /// Copy a statistics snapshot into the gauges
    pub fn update(&self, stats: &Stats, entries: u64, capacity: u64) {
        self.hits.set(clamp(stats.hits));
        self.misses.set(clamp(stats.misses));
        self.collisions.set(clamp(stats.collisions));
        self.del_hits.set(clamp(stats.del_hits));
        self.del_misses.set(clamp(stats.del_misses));
        self.evictions.set(clamp(stats.evictions));
        self.entries.set(clamp(entries));
        self.capacity_bytes.set(clamp(capacity));
    }

    /// Snapshot `cache` and update every gauge
    pub fn observe(&self, cache: &Cache) {
        self.update(&cache.stats(), cache.len(), cache.capacity());
    }

    /// Render the registry in the text exposition format
    pub fn render(&self) -> Result<String> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        String::from_utf8(buf)
            .map_err(|e| Error::Metrics(prometheus::Error::Msg(format!("exposition is not UTF-8: {}", e))))
    }

    /// Underlying registry, for embedding in a larger exporter
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

#[inline]
fn clamp(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::Config;
    use std::time::Duration;

    #[test]
    fn test_render_contains_all_gauges() {
        let exporter = StatsExporter::new().unwrap();
        let stats = Stats {
            hits: 7,
            misses: 3,
            collisions: 1,
            del_hits: 2,
            del_misses: 0,
            evictions: 5,
        };
        exporter.update(&stats, 42, 4096);

        let text = exporter.render().unwrap();
        assert!(text.contains("shardcache_hits_total 7"));
        assert!(text.contains("shardcache_misses_total 3"));
        assert!(text.contains("shardcache_collisions_total 1"));
        assert!(text.contains("shardcache_delete_hits_total 2"));
        assert!(text.contains("shardcache_delete_misses_total 0"));
        assert!(text.contains("shardcache_evictions_total 5"));
        assert!(text.contains("shardcache_entries 42"));
        assert!(text.contains("shardcache_capacity_bytes 4096"));
    }

    #[test]
    fn test_exporters_do_not_share_registries() {
        // A global registry would reject the second set of names.
        let first = StatsExporter::new().unwrap();
        let second = StatsExporter::new().unwrap();
        first.update(&Stats::default(), 1, 1);
        second.update(&Stats::default(), 2, 2);

        assert!(first.render().unwrap().contains("shardcache_entries 1"));
        assert!(second.render().unwrap().contains("shardcache_entries 2"));
    }

    #[test]
    fn test_observe_cache() {
        let mut config = Config::new(2, Duration::ZERO);
        config.max_entries_in_window = 20;
        config.max_entry_size = 32;
        let cache = Cache::new(config).unwrap();
        cache.set("a", b"1").unwrap();
        cache.get("a").unwrap();

        let exporter = StatsExporter::new().unwrap();
        exporter.observe(&cache);
        let text = exporter.render().unwrap();
        assert!(text.contains("shardcache_hits_total 1"));
        assert!(text.contains("shardcache_entries 1"));
    }

    #[test]
    fn test_clamp_saturates() {
        assert_eq!(clamp(u64::MAX), i64::MAX);
        assert_eq!(clamp(12), 12);
    }
}
