//! shardcache load generator
//!
//! Opens a cache, hammers it with parallel writers, then parallel readers,
//! iterates over the result and reports statistics.
//!
//! ```text
//! ┌───────────┐    ┌───────────┐    ┌───────────┐    ┌───────────┐
//! │  Writers  │───▶│  Readers  │───▶│  Iterate  │───▶│  Report   │
//! │ (threads) │    │ (threads) │    │           │    │ text/json │
//! └───────────┘    └───────────┘    └───────────┘    └───────────┘
//! ```

use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::{Parser, ValueEnum};
use serde::Serialize;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use shardcache::monitoring::StatsExporter;
use shardcache::{Cache, CacheSettings, Error, Result, Stats};

// =============================================================================
// CLI Arguments
// =============================================================================

/// Report format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
    Prometheus,
}

/// shardcache - load generator for the sharded byte cache
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// YAML settings file; overrides the cache flags below
    #[arg(long, env = "SHARDCACHE_CONFIG")]
    config: Option<PathBuf>,

    /// Number of shards (power of two)
    #[arg(long, env = "SHARDCACHE_SHARDS", default_value = "1024")]
    shards: usize,

    /// Entry life window in seconds; 0 disables expiry
    #[arg(long, env = "SHARDCACHE_LIFE_WINDOW_SECS", default_value = "600", allow_negative_numbers = true)]
    life_window_secs: i64,

    /// Background sweep period in seconds
    #[arg(long, env = "SHARDCACHE_CLEAN_INTERVAL_SECS", default_value = "1", allow_negative_numbers = true)]
    clean_interval_secs: i64,

    /// Expected entries per life window (pre-sizing only)
    #[arg(long, env = "SHARDCACHE_MAX_ENTRIES_IN_WINDOW", default_value = "600000")]
    max_entries_in_window: usize,

    /// Expected entry size in bytes (pre-sizing and warnings)
    #[arg(long, env = "SHARDCACHE_MAX_ENTRY_SIZE", default_value = "500")]
    max_entry_size: usize,

    /// Reject entries larger than --max-entry-size
    #[arg(long, env = "SHARDCACHE_ENFORCE_MAX_ENTRY_SIZE")]
    enforce_max_entry_size: bool,

    /// Total arena ceiling in bytes; 0 means unbounded
    #[arg(long, env = "SHARDCACHE_HARD_MAX_CACHE_SIZE", default_value = "0")]
    hard_max_cache_size: u64,

    /// Verify lookups by fingerprint only, without storing keys
    #[arg(long, env = "SHARDCACHE_FINGERPRINT_ONLY")]
    fingerprint_only: bool,

    /// Seed for the XXH3 hasher; FNV-1a is used when absent
    #[arg(long, env = "SHARDCACHE_HASH_SEED")]
    hash_seed: Option<u64>,

    /// Send cache warnings to the log
    #[arg(long, env = "SHARDCACHE_VERBOSE")]
    verbose: bool,

    /// Number of distinct keys to write
    #[arg(long, default_value = "1000000")]
    entries: usize,

    /// Value size in bytes
    #[arg(long, default_value = "256")]
    value_size: usize,

    /// Worker threads for the write and read phases
    #[arg(long, default_value = "4")]
    threads: usize,

    /// Report format
    #[arg(long, value_enum, default_value = "text")]
    format: Format,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

impl Args {
    fn settings(&self) -> Result<CacheSettings> {
        if let Some(path) = &self.config {
            info!("Loading settings from {}", path.display());
            return CacheSettings::from_file(path);
        }
        Ok(CacheSettings {
            shards: self.shards,
            life_window_secs: self.life_window_secs,
            clean_interval_secs: self.clean_interval_secs,
            max_entries_in_window: self.max_entries_in_window,
            max_entry_size: self.max_entry_size,
            enforce_max_entry_size: self.enforce_max_entry_size,
            verbose: self.verbose,
            hard_max_cache_size: self.hard_max_cache_size,
            store_keys: !self.fingerprint_only,
            hash_seed: self.hash_seed,
        })
    }
}

// =============================================================================
// Main
// =============================================================================

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args);

    if args.threads == 0 {
        return Err(Error::Config("--threads must be at least 1".into()));
    }

    let config = args.settings()?.into_config()?;
    info!("Starting shardcache load generator");
    info!("  Shards: {}", config.shards);
    info!("  Life window: {:?}", config.life_window);
    info!("  Hard max cache size: {} bytes", config.hard_max_cache_size);
    info!("  Entries: {} x {} bytes", args.entries, args.value_size);
    info!("  Threads: {}", args.threads);

    let cache = Cache::new(config)?;
    let value = vec![b'a'; args.value_size];

    let write = run_phase(&cache, &args, |cache, key| cache.set(key, &value).map(|_| true))?;
    info!("Write phase finished in {:?}", write.elapsed);

    let read = run_phase(&cache, &args, |cache, key| match cache.get(key) {
        Ok(_) => Ok(true),
        Err(err) if err.is_not_found() => Ok(false),
        Err(err) => Err(err),
    })?;
    info!("Read phase finished in {:?} ({} misses)", read.elapsed, read.failed);

    let started = Instant::now();
    let iterated = cache.iterator().count();
    let iterate_elapsed = started.elapsed();
    info!("Iterated {} entries in {:?}", iterated, iterate_elapsed);

    let report = Report {
        shards: cache.shard_count(),
        entries: cache.len(),
        capacity_bytes: cache.capacity(),
        used_bytes: cache.used_bytes(),
        write_ops_per_sec: write.ops_per_sec(),
        read_ops_per_sec: read.ops_per_sec(),
        iterated,
        iterate_millis: iterate_elapsed.as_millis() as u64,
        hit_ratio: cache.stats().hit_ratio(),
        stats: cache.stats(),
    };
    print_report(&cache, &report, args.format)?;

    cache.close();
    info!("Shutdown complete");
    Ok(())
}

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    // Reports go to stdout; keep logs on stderr.
    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}

// =============================================================================
// Workload
// =============================================================================

struct PhaseResult {
    ops: usize,
    failed: usize,
    elapsed: Duration,
}

impl PhaseResult {
    fn ops_per_sec(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs == 0.0 {
            0.0
        } else {
            self.ops as f64 / secs
        }
    }
}

/// Split `0..entries` across `threads` workers and apply `op` to every key.
/// `op` returns `Ok(false)` for an expected failure such as a miss.
fn run_phase<F>(cache: &Cache, args: &Args, op: F) -> Result<PhaseResult>
where
    F: Fn(&Cache, &str) -> Result<bool> + Sync,
{
    let per_thread = args.entries.div_ceil(args.threads);
    let started = Instant::now();

    let outcomes: Vec<Result<usize>> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..args.threads)
            .map(|t| {
                let op = &op;
                let range = (t * per_thread)..((t + 1) * per_thread).min(args.entries);
                scope.spawn(move || -> Result<usize> {
                    let mut failed = 0;
                    let mut key = String::with_capacity(16);
                    for i in range {
                        key.clear();
                        key.push_str(&i.to_string());
                        if !op(cache, &key)? {
                            failed += 1;
                        }
                    }
                    Ok(failed)
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|h| {
                h.join()
                    .unwrap_or_else(|_| Err(Error::Internal("worker thread panicked".into())))
            })
            .collect()
    });

    let mut failed = 0;
    for outcome in outcomes {
        failed += outcome?;
    }

    Ok(PhaseResult {
        ops: args.entries,
        failed,
        elapsed: started.elapsed(),
    })
}

// =============================================================================
// Reporting
// =============================================================================

#[derive(Debug, Serialize)]
struct Report {
    shards: usize,
    entries: u64,
    capacity_bytes: u64,
    used_bytes: u64,
    write_ops_per_sec: f64,
    read_ops_per_sec: f64,
    iterated: usize,
    iterate_millis: u64,
    hit_ratio: f64,
    stats: Stats,
}

fn print_report(cache: &Cache, report: &Report, format: Format) -> Result<()> {
    match format {
        Format::Text => {
            println!("shards:           {}", report.shards);
            println!("entries:          {}", report.entries);
            println!("capacity:         {} bytes", report.capacity_bytes);
            println!("used:             {} bytes", report.used_bytes);
            println!("writes/sec:       {:.0}", report.write_ops_per_sec);
            println!("reads/sec:        {:.0}", report.read_ops_per_sec);
            println!("iterated:         {} in {} ms", report.iterated, report.iterate_millis);
            println!("hit ratio:        {:.4}", report.hit_ratio);
            println!("hits:             {}", report.stats.hits);
            println!("misses:           {}", report.stats.misses);
            println!("collisions:       {}", report.stats.collisions);
            println!("delete hits:      {}", report.stats.del_hits);
            println!("delete misses:    {}", report.stats.del_misses);
            println!("evictions:        {}", report.stats.evictions);
        }
        Format::Json => {
            println!("{}", serde_json::to_string_pretty(report)?);
        }
        Format::Prometheus => {
            let exporter = StatsExporter::new()?;
            exporter.observe(cache);
            print!("{}", exporter.render()?);
        }
    }

    if report.stats.collisions > 0 {
        warn!(
            collisions = report.stats.collisions,
            "Fingerprint collisions observed; consider --hash-seed"
        );
    }
    Ok(())
}
