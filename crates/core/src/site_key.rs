//! Tracked-site keys.
//!
//! A site key identifies the tracked site a beacon belongs to. It is the
//! second dimension of rate limiting and the handle the project id is
//! derived from.

use regex::Regex;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::LazyLock;

use crate::error::{AuthErrorCode, Error, Result};

/// Site key format: 8-64 characters of `[A-Za-z0-9_-]`.
pub const SITE_KEY_PATTERN: &str = r"^[A-Za-z0-9_-]{8,64}$";

/// Compiled site key regex (lazy initialization).
static SITE_KEY_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(SITE_KEY_PATTERN).expect("invalid site key pattern"));

/// Parsed and validated site key from a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteKey {
    raw: String,
}

impl SiteKey {
    /// Parse and validate a site key.
    pub fn parse(key: &str) -> Result<Self> {
        if key.is_empty() {
            return Err(Error::auth(AuthErrorCode::MissingKey, "Site key is required"));
        }

        if !SITE_KEY_REGEX.is_match(key) {
            return Err(Error::auth(
                AuthErrorCode::InvalidFormat,
                "Invalid site key format",
            ));
        }

        Ok(Self {
            raw: key.to_string(),
        })
    }

    /// Get the raw key string.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Deterministic project id for this key.
    ///
    /// Stands in for the tenant lookup owned by the persistence layer.
    pub fn project_id(&self) -> String {
        let mut hasher = DefaultHasher::new();
        self.raw.hash(&mut hasher);
        format!("proj-{:016x}", hasher.finish())
    }
}

/// Extract a site key from request headers.
///
/// Checks `X-API-Key` first, then `Authorization: Bearer <key>`.
pub fn extract_site_key(auth_header: Option<&str>, api_key_header: Option<&str>) -> Result<SiteKey> {
    if let Some(key) = api_key_header {
        return SiteKey::parse(key.trim());
    }

    if let Some(auth) = auth_header {
        if let Some(key) = auth.strip_prefix("Bearer ") {
            return SiteKey::parse(key.trim());
        }
        return Err(Error::auth(
            AuthErrorCode::InvalidFormat,
            "Authorization header must use the Bearer scheme",
        ));
    }

    Err(Error::auth(AuthErrorCode::MissingKey, "Site key is required"))
}
