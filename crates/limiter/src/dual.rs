//! Dual-key rate limiting by client address and tracked-site key.

use gate_core::{for_log, Result};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::bucket::{TokenBuckets, REFILL_INTERVAL};
use crate::config::RateLimitConfig;

/// Dimension that rejected a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitType {
    Ip,
    ApiKey,
}

impl LimitType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ip => "ip",
            Self::ApiKey => "api_key",
        }
    }
}

impl fmt::Display for LimitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Details of an exhausted limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitExceeded {
    pub limit_type: LimitType,
    /// The address or site key whose bucket is empty
    pub identifier: String,
    /// Requests permitted per window
    pub limit: u32,
    pub window: Duration,
    /// Time until the exhausted bucket refills
    pub retry_after: Duration,
}

/// Outcome of an admission check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed,
    Exceeded(RateLimitExceeded),
}

impl RateLimitDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }
}

/// Remaining tokens in both dimensions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitStatus {
    pub ip_remaining: u32,
    pub ip_limit: u32,
    pub api_key_remaining: u32,
    pub api_key_limit: u32,
}

/// Two independent token-bucket maps, one per dimension.
///
/// The address is checked first. A request that would fail both limits is
/// reported as an address failure and consumes nothing from the site key.
pub struct DualKeyRateLimiter {
    config: RateLimitConfig,
    by_ip: TokenBuckets,
    by_api_key: TokenBuckets,
}

impl DualKeyRateLimiter {
    /// Build a limiter, rejecting an invalid configuration.
    pub fn new(config: RateLimitConfig) -> Result<Self> {
        config.check()?;

        let idle = config.idle_timeout();
        Ok(Self {
            by_ip: TokenBuckets::new(config.max_ips, idle),
            by_api_key: TokenBuckets::new(config.max_api_keys, idle),
            config,
        })
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Admit or reject one request.
    pub fn check_rate_limit(&self, ip: &str, api_key: &str) -> RateLimitDecision {
        self.check_rate_limit_at(ip, api_key, Instant::now())
    }

    /// Admit or reject one request at an explicit time.
    pub fn check_rate_limit_at(&self, ip: &str, api_key: &str, now: Instant) -> RateLimitDecision {
        let ip_limit = self.config.max_tokens_per_ip;
        if self.by_ip.consume_at(ip, ip_limit, now).is_none() {
            return self.exceeded(LimitType::Ip, ip, ip_limit, self.by_ip.reset_after(ip, now));
        }

        let key_limit = self.config.max_tokens_per_api_key;
        if self.by_api_key.consume_at(api_key, key_limit, now).is_none() {
            return self.exceeded(
                LimitType::ApiKey,
                api_key,
                key_limit,
                self.by_api_key.reset_after(api_key, now),
            );
        }

        RateLimitDecision::Allowed
    }

    fn exceeded(
        &self,
        limit_type: LimitType,
        identifier: &str,
        limit: u32,
        retry_after: Duration,
    ) -> RateLimitDecision {
        warn!(
            limit_type = %limit_type,
            identifier = %for_log(identifier),
            limit = limit,
            retry_after_secs = retry_after.as_secs(),
            "Rate limit exceeded"
        );

        RateLimitDecision::Exceeded(RateLimitExceeded {
            limit_type,
            identifier: identifier.to_string(),
            limit,
            window: REFILL_INTERVAL,
            retry_after,
        })
    }

    /// Remaining tokens for both dimensions, consuming nothing.
    pub fn get_rate_limit_status(&self, ip: &str, api_key: &str) -> RateLimitStatus {
        let now = Instant::now();
        RateLimitStatus {
            ip_remaining: self.by_ip.remaining_at(ip, self.config.max_tokens_per_ip, now),
            ip_limit: self.config.max_tokens_per_ip,
            api_key_remaining: self.by_api_key.remaining_at(
                api_key,
                self.config.max_tokens_per_api_key,
                now,
            ),
            api_key_limit: self.config.max_tokens_per_api_key,
        }
    }

    /// Approximate number of tracked addresses and site keys.
    pub fn tracked_keys(&self) -> (u64, u64) {
        let counts = (self.by_ip.tracked(), self.by_api_key.tracked());
        debug!(ips = counts.0, api_keys = counts.1, "Rate limiter key counts");
        counts
    }
}

/// Shared rate limiter state.
pub type SharedRateLimiter = Arc<DualKeyRateLimiter>;
