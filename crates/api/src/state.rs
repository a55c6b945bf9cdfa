//! Application state shared across handlers.

use gate_core::{RedirectPolicy, Result, Role};
use rate_limiter::{DualKeyRateLimiter, RateLimitConfig, SharedRateLimiter};
use result_cache::{CacheConfig, ResultCache, SharedResultCache, REPORT_CACHE, WIDGET_CACHE};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use crate::store::{EventSink, ReportSource};

/// How often the housekeeping task flushes idle limiter buckets.
const HOUSEKEEPING_INTERVAL: Duration = Duration::from_secs(60);

/// Who may reach the administrative routes.
#[derive(Debug, Clone, Default)]
pub struct AdminAccess {
    /// Permitted `Origin` values; empty admits every origin
    pub allowed_origins: Vec<String>,
    /// Bearer token -> role
    pub admin_tokens: HashMap<String, Role>,
}

impl AdminAccess {
    pub fn new(allowed_origins: Vec<String>, admin_tokens: HashMap<String, Role>) -> Self {
        Self {
            allowed_origins,
            admin_tokens,
        }
    }

    pub fn role_for_token(&self, token: &str) -> Option<Role> {
        self.admin_tokens.get(token).copied()
    }
}

/// Which peers may name the client address through `X-Forwarded-For`
/// or `X-Real-IP`. Headers are ignored unless explicitly trusted.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProxyTrust {
    #[serde(default)]
    pub trust_forwarded_headers: bool,
    /// Restricts trust to these socket peers; empty trusts every peer
    #[serde(default)]
    pub trusted_proxies: Vec<IpAddr>,
}

impl ProxyTrust {
    /// Honour forwarding headers from any peer.
    pub fn trust_all() -> Self {
        Self {
            trust_forwarded_headers: true,
            trusted_proxies: Vec::new(),
        }
    }

    pub fn honours(&self, peer: Option<IpAddr>) -> bool {
        self.trust_forwarded_headers
            && (self.trusted_proxies.is_empty()
                || peer.is_some_and(|p| self.trusted_proxies.contains(&p)))
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Where accepted beacons go
    pub sink: Arc<dyn EventSink>,
    /// Where reports and widgets are computed
    pub reports: Arc<dyn ReportSource>,
    pub rate_limiter: SharedRateLimiter,
    pub report_cache: SharedResultCache<Value>,
    pub widget_cache: SharedResultCache<Value>,
    pub access: Arc<AdminAccess>,
    pub redirect: Arc<RedirectPolicy>,
    pub proxy: Arc<ProxyTrust>,
}

impl AppState {
    /// Build state with the fixed cache sizes. Fails on an invalid limiter config.
    pub fn new(
        sink: Arc<dyn EventSink>,
        reports: Arc<dyn ReportSource>,
        rate_config: RateLimitConfig,
    ) -> Result<Self> {
        Ok(Self {
            sink,
            reports,
            rate_limiter: Arc::new(DualKeyRateLimiter::new(rate_config)?),
            report_cache: Arc::new(ResultCache::new(REPORT_CACHE)),
            widget_cache: Arc::new(ResultCache::new(WIDGET_CACHE)),
            access: Arc::new(AdminAccess::default()),
            redirect: Arc::new(RedirectPolicy::default()),
            proxy: Arc::new(ProxyTrust::default()),
        })
    }

    pub fn with_access(mut self, access: AdminAccess) -> Self {
        self.access = Arc::new(access);
        self
    }

    pub fn with_redirect(mut self, policy: RedirectPolicy) -> Self {
        self.redirect = Arc::new(policy);
        self
    }

    pub fn with_proxy_trust(mut self, trust: ProxyTrust) -> Self {
        self.proxy = Arc::new(trust);
        self
    }

    /// Replace both caches, e.g. with short TTLs in tests.
    pub fn with_caches(mut self, report: CacheConfig, widget: CacheConfig) -> Self {
        self.report_cache = Arc::new(ResultCache::new(report));
        self.widget_cache = Arc::new(ResultCache::new(widget));
        self
    }

    /// Start the housekeeping background task.
    /// Returns a handle that can be used to cancel the task.
    pub fn start_housekeeping(&self) -> tokio::task::JoinHandle<()> {
        let rate_limiter = self.rate_limiter.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(HOUSEKEEPING_INTERVAL);
            loop {
                interval.tick().await;
                // Counting runs the maps' pending evictions.
                rate_limiter.tracked_keys();
            }
        })
    }
}
