//! Dual-key token bucket rate limiting.
//!
//! Requests are admitted per client address and per tracked-site key, each
//! with its own once-per-minute bucket.

pub mod bucket;
pub mod config;
pub mod dual;

pub use bucket::{TokenBucket, TokenBuckets, REFILL_INTERVAL};
pub use config::RateLimitConfig;
pub use dual::{
    DualKeyRateLimiter, LimitType, RateLimitDecision, RateLimitExceeded, RateLimitStatus,
    SharedRateLimiter,
};
