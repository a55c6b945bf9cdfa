//! Core types, limits, sanitization and payload validation for the beacon gate.

pub mod error;
pub mod limits;
pub mod payload;
pub mod redirect;
pub mod role;
pub mod sanitize;
pub mod site_key;
pub mod validate;

pub use error::{Error, Result};
pub use payload::*;
pub use redirect::RedirectPolicy;
pub use role::{require_role, Role};
pub use sanitize::{for_log, sanitize};
pub use site_key::{extract_site_key, SiteKey};
pub use validate::*;
