//! Short-lived result caching with project-scoped invalidation.

pub mod cache;
pub mod config;
pub mod stats;

pub use cache::{ResultCache, SharedResultCache};
pub use config::{CacheConfig, REPORT_CACHE, WIDGET_CACHE};
pub use stats::CacheStats;
