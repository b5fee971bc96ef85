//! Cache Observability
//!
//! Publishes cache statistics in the Prometheus text exposition format.
//! Nothing here runs on the cache hot path: callers take a [`Stats`]
//! snapshot and push it into the exporter when they scrape.
//!
//! [`Stats`]: crate::cache::Stats

mod exporter;

pub use exporter::{StatsExporter, METRIC_NAMESPACE};
