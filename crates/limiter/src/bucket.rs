//! Token buckets with a once-per-minute full refill.
//!
//! A bucket starts full. Each permitted request takes one token. Once a
//! full `REFILL_INTERVAL` has passed since the last refill, the next access
//! resets the bucket to capacity in one step; there is no proportional
//! refill in between. A client can therefore spend a full window at second
//! 59 and another at second 61.

use moka::policy::EvictionPolicy;
use moka::sync::Cache;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Interval after which a bucket is refilled to capacity.
pub const REFILL_INTERVAL: Duration = Duration::from_secs(60);

struct BucketState {
    tokens: u32,
    last_refill: Instant,
}

/// Single-key token bucket.
///
/// The token count and refill time are read and written under one lock, so
/// concurrent requests for the same key never double-refill or lose a
/// decrement.
pub struct TokenBucket {
    state: Mutex<BucketState>,
}

impl TokenBucket {
    pub fn new(capacity: u32, now: Instant) -> Self {
        Self {
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: now,
            }),
        }
    }

    /// Take one token, returning how many remain, or `None` when empty.
    pub fn try_acquire(&self, capacity: u32, now: Instant) -> Option<u32> {
        let mut state = self.state.lock();

        if now.saturating_duration_since(state.last_refill) >= REFILL_INTERVAL {
            state.tokens = capacity;
            state.last_refill = now;
        }
        state.tokens = state.tokens.min(capacity);

        if state.tokens > 0 {
            state.tokens -= 1;
            Some(state.tokens)
        } else {
            None
        }
    }

    /// Tokens the next request would see, without consuming any.
    pub fn remaining(&self, capacity: u32, now: Instant) -> u32 {
        let state = self.state.lock();
        if now.saturating_duration_since(state.last_refill) >= REFILL_INTERVAL {
            capacity
        } else {
            state.tokens.min(capacity)
        }
    }

    /// Time until the bucket is next refilled.
    pub fn reset_after(&self, now: Instant) -> Duration {
        let state = self.state.lock();
        REFILL_INTERVAL.saturating_sub(now.saturating_duration_since(state.last_refill))
    }
}

/// Keyed collection of token buckets.
///
/// Buckets are created on first use, dropped after sitting idle, and capped
/// in number with least-recently-used eviction. Lookups for different keys
/// never contend on a shared lock.
pub struct TokenBuckets {
    buckets: Cache<String, Arc<TokenBucket>>,
}

impl TokenBuckets {
    pub fn new(max_keys: u64, idle_timeout: Duration) -> Self {
        Self {
            buckets: Cache::builder()
                .max_capacity(max_keys)
                .time_to_idle(idle_timeout)
                .eviction_policy(EvictionPolicy::lru())
                .build(),
        }
    }

    /// Fetch the bucket for `key`, creating a full one if absent.
    fn bucket(&self, key: &str, capacity: u32, now: Instant) -> Arc<TokenBucket> {
        // Avoid String allocation if key already exists
        if let Some(bucket) = self.buckets.get(key) {
            return bucket;
        }
        self.buckets
            .get_with(key.to_string(), || Arc::new(TokenBucket::new(capacity, now)))
    }

    /// Take one token for `key`; true if the request is permitted.
    pub fn check_and_consume(&self, key: &str, max_tokens: u32) -> bool {
        self.consume_at(key, max_tokens, Instant::now()).is_some()
    }

    /// Take one token for `key` at an explicit time.
    pub fn consume_at(&self, key: &str, max_tokens: u32, now: Instant) -> Option<u32> {
        self.bucket(key, max_tokens, now).try_acquire(max_tokens, now)
    }

    /// Look up a bucket without touching its idle timer or LRU position.
    ///
    /// Walks the map, so it is meant for diagnostics, never the request path.
    fn peek(&self, key: &str) -> Option<Arc<TokenBucket>> {
        self.buckets
            .iter()
            .find(|(k, _)| k.as_str() == key)
            .map(|(_, bucket)| bucket)
    }

    /// Remaining tokens for `key`; an unseen key reports `max_tokens`.
    /// Reading does not keep an idle bucket alive.
    pub fn remaining_at(&self, key: &str, max_tokens: u32, now: Instant) -> u32 {
        self.peek(key)
            .map(|bucket| bucket.remaining(max_tokens, now))
            .unwrap_or(max_tokens)
    }

    /// Time until `key`'s bucket refills; zero for an unseen key.
    ///
    /// Called right after a consume, so the lookup may touch the bucket.
    pub fn reset_after(&self, key: &str, now: Instant) -> Duration {
        self.buckets
            .get(key)
            .map(|bucket| bucket.reset_after(now))
            .unwrap_or(Duration::ZERO)
    }

    /// Approximate number of tracked keys.
    pub fn tracked(&self) -> u64 {
        self.buckets.run_pending_tasks();
        self.buckets.entry_count()
    }
}
