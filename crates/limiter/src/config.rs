//! Rate limiter configuration.

use gate_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::Validate;

/// Thresholds and bounds for the dual-key limiter.
///
/// The two per-minute thresholds have no default: a deployment that does
/// not set them fails at startup.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RateLimitConfig {
    /// Requests per minute allowed for one client address
    #[validate(range(min = 1))]
    pub max_tokens_per_ip: u32,

    /// Requests per minute allowed for one tracked-site key
    #[validate(range(min = 1))]
    pub max_tokens_per_api_key: u32,

    /// Buckets untouched for this long are dropped
    #[serde(default = "default_idle_timeout_secs")]
    #[validate(range(min = 1))]
    pub idle_timeout_secs: u64,

    /// Distinct client addresses tracked at once
    #[serde(default = "default_max_ips")]
    #[validate(range(min = 1))]
    pub max_ips: u64,

    /// Distinct site keys tracked at once
    #[serde(default = "default_max_api_keys")]
    #[validate(range(min = 1))]
    pub max_api_keys: u64,
}

fn default_idle_timeout_secs() -> u64 {
    300
}

fn default_max_ips() -> u64 {
    10_000
}

fn default_max_api_keys() -> u64 {
    1_000
}

impl RateLimitConfig {
    /// Config with the given thresholds and default bounds.
    pub fn new(max_tokens_per_ip: u32, max_tokens_per_api_key: u32) -> Self {
        Self {
            max_tokens_per_ip,
            max_tokens_per_api_key,
            idle_timeout_secs: default_idle_timeout_secs(),
            max_ips: default_max_ips(),
            max_api_keys: default_max_api_keys(),
        }
    }

    pub fn with_idle_timeout(mut self, idle: Duration) -> Self {
        self.idle_timeout_secs = idle.as_secs().max(1);
        self
    }

    pub fn with_capacity(mut self, max_ips: u64, max_api_keys: u64) -> Self {
        self.max_ips = max_ips;
        self.max_api_keys = max_api_keys;
        self
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    /// Reject zero thresholds and bounds.
    pub fn check(&self) -> Result<()> {
        self.validate()
            .map_err(|e| Error::config(format!("invalid rate limit config: {}", e)))
    }
}
