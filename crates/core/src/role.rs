//! Dashboard roles.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Role of an administrative caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Viewer,
    Editor,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Viewer => "viewer",
            Self::Editor => "editor",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "viewer" => Ok(Self::Viewer),
            "editor" => Ok(Self::Editor),
            "admin" => Ok(Self::Admin),
            _ => Err(Error::validation(format!("unknown role: {}", s))),
        }
    }
}

/// Check a resolved role against the roles an endpoint permits.
pub fn require_role(role: Option<Role>, permitted: &[Role]) -> Result<Role> {
    match role {
        Some(role) if permitted.contains(&role) => Ok(role),
        Some(role) => Err(Error::forbidden(format!(
            "role '{}' is not permitted for this endpoint",
            role
        ))),
        None => Err(Error::forbidden("no role assigned to caller")),
    }
}
