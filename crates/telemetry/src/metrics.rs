//! In-process metrics.
//!
//! Counters and histograms are plain atomics; a snapshot is served by the
//! admin API.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// A counter metric.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_by(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Histogram for latency tracking.
#[derive(Debug)]
pub struct Histogram {
    /// Buckets: 1ms, 5ms, 10ms, 25ms, 50ms, 100ms, 250ms, 500ms, 1s, 5s
    buckets: [AtomicU64; 10],
    sum: AtomicU64,
    count: AtomicU64,
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

impl Histogram {
    const BUCKET_BOUNDS: [u64; 10] = [1, 5, 10, 25, 50, 100, 250, 500, 1000, 5000];

    pub fn new() -> Self {
        Self {
            buckets: Default::default(),
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    /// Records a value in milliseconds.
    pub fn observe(&self, ms: u64) {
        self.sum.fetch_add(ms, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);

        let idx = Self::BUCKET_BOUNDS
            .iter()
            .position(|&bound| ms <= bound)
            .unwrap_or(Self::BUCKET_BOUNDS.len() - 1);
        self.buckets[idx].fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn sum(&self) -> u64 {
        self.sum.load(Ordering::Relaxed)
    }

    pub fn mean(&self) -> f64 {
        let count = self.count();
        if count == 0 {
            0.0
        } else {
            self.sum() as f64 / count as f64
        }
    }

    /// Returns (upper bound, count) per bucket.
    pub fn buckets(&self) -> Vec<(u64, u64)> {
        Self::BUCKET_BOUNDS
            .iter()
            .zip(self.buckets.iter())
            .map(|(&bound, count)| (bound, count.load(Ordering::Relaxed)))
            .collect()
    }
}

/// Collected metrics for the beacon gate.
#[derive(Debug, Default)]
pub struct Metrics {
    // Ingestion
    pub beacons_received: Counter,
    pub beacons_accepted: Counter,
    pub beacons_failed_validation: Counter,
    pub rate_limited_ip: Counter,
    pub rate_limited_api_key: Counter,
    pub sink_errors: Counter,

    // Reporting
    pub report_queries: Counter,
    pub widget_requests: Counter,
    pub report_errors: Counter,

    // Latency histograms
    pub ingest_latency_ms: Histogram,
    pub report_latency_ms: Histogram,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }
}

/// A snapshot of metrics at a point in time.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub timestamp: DateTime<Utc>,
    pub beacons_received: u64,
    pub beacons_accepted: u64,
    pub beacons_failed_validation: u64,
    pub rate_limited_ip: u64,
    pub rate_limited_api_key: u64,
    pub sink_errors: u64,
    pub report_queries: u64,
    pub widget_requests: u64,
    pub report_errors: u64,
    pub ingest_latency_mean_ms: f64,
    pub report_latency_mean_ms: f64,
}

impl Metrics {
    /// Takes a snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            timestamp: Utc::now(),
            beacons_received: self.beacons_received.get(),
            beacons_accepted: self.beacons_accepted.get(),
            beacons_failed_validation: self.beacons_failed_validation.get(),
            rate_limited_ip: self.rate_limited_ip.get(),
            rate_limited_api_key: self.rate_limited_api_key.get(),
            sink_errors: self.sink_errors.get(),
            report_queries: self.report_queries.get(),
            widget_requests: self.widget_requests.get(),
            report_errors: self.report_errors.get(),
            ingest_latency_mean_ms: self.ingest_latency_ms.mean(),
            report_latency_mean_ms: self.report_latency_ms.mean(),
        }
    }
}

/// Global metrics registry.
pub static METRICS: std::sync::LazyLock<Metrics> = std::sync::LazyLock::new(Metrics::new);

/// Get the global metrics instance.
pub fn metrics() -> &'static Metrics {
    &METRICS
}
