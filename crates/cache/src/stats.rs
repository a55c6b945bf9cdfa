//! Cache statistics.

use serde::Serialize;

/// Point-in-time counters for one cache.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub name: &'static str,
    pub size: u64,
    pub hit_rate: f64,
    pub hit_count: u64,
    pub miss_count: u64,
    pub eviction_count: u64,
}

impl CacheStats {
    pub fn new(name: &'static str, size: u64, hits: u64, misses: u64, evictions: u64) -> Self {
        let lookups = hits + misses;
        let hit_rate = if lookups == 0 {
            0.0
        } else {
            hits as f64 / lookups as f64
        };

        Self {
            name,
            size,
            hit_rate,
            hit_count: hits,
            miss_count: misses,
            eviction_count: evictions,
        }
    }
}
