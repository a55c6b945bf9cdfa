//! Generic short-TTL result cache.
//!
//! Values live for a fixed time from write and the cache holds at most
//! `max_entries`, evicting the least recently used entry beyond that.
//! Concurrent callers asking for the same missing key share one
//! computation; callers for other keys are never held up by it.
//! A computation that straddles an invalidation of its project still
//! answers its callers but is not kept.

use gate_core::for_log;
use moka::future::Cache;
use moka::notification::RemovalCause;
use moka::policy::EvictionPolicy;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use telemetry::Counter;
use tracing::{debug, info, warn};

use crate::config::CacheConfig;
use crate::stats::CacheStats;

/// Keyed memoization of computed results.
pub struct ResultCache<V> {
    config: CacheConfig,
    entries: Cache<String, V>,
    hits: Counter,
    misses: Counter,
    evictions: Arc<Counter>,
    /// Invalidations per namespaced project id
    generations: Mutex<HashMap<String, u64>>,
    /// Number of `invalidate_all` calls
    flushes: AtomicU64,
}

impl<V> ResultCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(config: CacheConfig) -> Self {
        let evictions = Arc::new(Counter::new());
        let listener_evictions = evictions.clone();

        let entries = Cache::builder()
            .max_capacity(config.max_entries)
            .time_to_live(config.ttl)
            .eviction_policy(EvictionPolicy::lru())
            .eviction_listener(move |_key, _value, cause: RemovalCause| {
                if cause.was_evicted() {
                    listener_evictions.inc();
                }
            })
            .build();

        Self {
            config,
            entries,
            hits: Counter::new(),
            misses: Counter::new(),
            evictions,
            generations: Mutex::new(HashMap::new()),
            flushes: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Build a key in this cache's namespace: `<ns><project>:<part>:...`.
    pub fn key(&self, project_id: &str, parts: &[&str]) -> String {
        let mut key = format!("{}{}", self.config.namespace, project_id);
        for part in parts {
            key.push(':');
            key.push_str(part);
        }
        key
    }

    /// Return the cached value for `key`, computing it on a miss.
    ///
    /// Only one caller runs `compute` for a given missing key; the others
    /// wait for its result. A failed computation is not cached, so the next
    /// caller retries.
    pub async fn get_or_compute<F, E>(&self, key: &str, compute: F) -> Result<V, Arc<E>>
    where
        F: Future<Output = Result<V, E>>,
        E: Send + Sync + 'static,
    {
        let prefix = self.project_prefix(key);
        let started = self.generation(prefix);

        let result = self
            .entries
            .entry(key.to_string())
            .or_try_insert_with(compute)
            .await;

        match result {
            Ok(entry) if entry.is_fresh() => {
                self.misses.inc();
                debug!(cache = self.config.name, key = %for_log(key), "Cache miss");
                if self.generation(prefix) != started {
                    self.entries.invalidate(key).await;
                    debug!(
                        cache = self.config.name,
                        key = %for_log(key),
                        "Dropped result computed across an invalidation"
                    );
                }
                Ok(entry.into_value())
            }
            Ok(entry) => {
                self.hits.inc();
                debug!(cache = self.config.name, key = %for_log(key), "Cache hit");
                Ok(entry.into_value())
            }
            Err(e) => {
                self.misses.inc();
                warn!(cache = self.config.name, key = %for_log(key), "Cache computation failed");
                Err(e)
            }
        }
    }

    /// Cached value for `key`, without computing or counting a lookup.
    pub async fn peek(&self, key: &str) -> Option<V> {
        self.entries.get(key).await
    }

    /// Remove every entry belonging to `project_id`.
    ///
    /// Scans all keys; a key belongs to the project when it equals the
    /// namespaced project id or continues it with ':' or '/'. Results still
    /// being computed for the project are discarded when they land.
    pub async fn invalidate_project(&self, project_id: &str) -> usize {
        let prefix = format!("{}{}", self.config.namespace, project_id);
        *self.generations.lock().entry(prefix.clone()).or_default() += 1;

        let doomed: Vec<Arc<String>> = self
            .entries
            .iter()
            .filter(|(key, _)| belongs_to(key, &prefix))
            .map(|(key, _)| key)
            .collect();

        for key in &doomed {
            self.entries.invalidate(key.as_str()).await;
        }

        info!(
            cache = self.config.name,
            project_id = %for_log(project_id),
            removed = doomed.len(),
            "Invalidated project entries"
        );
        doomed.len()
    }

    /// Remove every entry.
    pub fn invalidate_all(&self) {
        self.flushes.fetch_add(1, Ordering::SeqCst);
        self.entries.invalidate_all();
        info!(cache = self.config.name, "Invalidated all entries");
    }

    /// Current size and lookup counters.
    pub async fn stats(&self) -> CacheStats {
        self.entries.run_pending_tasks().await;
        CacheStats::new(
            self.config.name,
            self.entries.entry_count(),
            self.hits.get(),
            self.misses.get(),
            self.evictions.get(),
        )
    }
}

impl<V> ResultCache<V> {
    /// Namespaced project id a key was built from.
    fn project_prefix<'k>(&self, key: &'k str) -> &'k str {
        let namespace_len = if key.starts_with(self.config.namespace) {
            self.config.namespace.len()
        } else {
            0
        };
        let end = key[namespace_len..]
            .find([':', '/'])
            .map_or(key.len(), |i| namespace_len + i);
        &key[..end]
    }

    /// Changes whenever `prefix` or the whole cache is invalidated.
    fn generation(&self, prefix: &str) -> u64 {
        let project = self.generations.lock().get(prefix).copied().unwrap_or(0);
        self.flushes.load(Ordering::SeqCst) + project
    }
}

fn belongs_to(key: &str, prefix: &str) -> bool {
    match key.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with(':') || rest.starts_with('/'),
        None => false,
    }
}

/// Shared cache handle.
pub type SharedResultCache<V> = Arc<ResultCache<V>>;
