//! Post-login redirect allow-list.
//!
//! Only relative paths from a fixed set are followed. Absolute URLs and
//! protocol-relative paths are rejected outright; unknown relative paths
//! fall back to the configured default.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{Error, Result};

/// Redirect allow-list configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedirectPolicy {
    #[serde(default = "default_allowed")]
    pub allowed: HashSet<String>,
    #[serde(default = "default_target")]
    pub default: String,
}

fn default_allowed() -> HashSet<String> {
    ["/", "/dashboard", "/projects", "/settings"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_target() -> String {
    "/".to_string()
}

impl Default for RedirectPolicy {
    fn default() -> Self {
        Self {
            allowed: default_allowed(),
            default: default_target(),
        }
    }
}

impl RedirectPolicy {
    pub fn new(allowed: impl IntoIterator<Item = impl Into<String>>, default: impl Into<String>) -> Self {
        Self {
            allowed: allowed.into_iter().map(Into::into).collect(),
            default: default.into(),
        }
    }

    /// Resolve a requested redirect target.
    pub fn resolve<'a>(&'a self, target: Option<&'a str>) -> Result<&'a str> {
        let Some(target) = target.map(str::trim).filter(|t| !t.is_empty()) else {
            return Ok(&self.default);
        };

        // Browsers treat a backslash after the leading slash like a second slash.
        if target.starts_with("//") || target.starts_with("/\\") {
            return Err(Error::invalid_argument(
                "protocol-relative redirect targets are not allowed",
            ));
        }
        if !target.starts_with('/') || url::Url::parse(target).is_ok() {
            return Err(Error::invalid_argument(
                "absolute redirect targets are not allowed",
            ));
        }

        if self.allowed.contains(target) {
            Ok(target)
        } else {
            Ok(&self.default)
        }
    }
}
