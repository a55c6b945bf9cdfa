//! Cache policies for the two traffic classes.

use std::time::Duration;

/// Size, lifetime and key namespace of one cache instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// Name used in logs and stats
    pub name: &'static str,
    /// Prefix placed before the project id in every key
    pub namespace: &'static str,
    pub max_entries: u64,
    /// Absolute lifetime from write
    pub ttl: Duration,
}

/// Interactive report queries: fresh enough for dashboards, long enough to
/// absorb several panels asking for the same report.
pub const REPORT_CACHE: CacheConfig = CacheConfig {
    name: "report",
    namespace: "",
    max_entries: 500,
    ttl: Duration::from_secs(30),
};

/// Public widgets embedded on third-party pages.
pub const WIDGET_CACHE: CacheConfig = CacheConfig {
    name: "widget",
    namespace: "widget:",
    max_entries: 200,
    ttl: Duration::from_secs(60),
};

impl CacheConfig {
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_max_entries(mut self, max_entries: u64) -> Self {
        self.max_entries = max_entries;
        self
    }
}
