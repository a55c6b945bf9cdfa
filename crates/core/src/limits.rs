//! Size limits for inbound beacons.
//!
//! Field limits match the storage layer's column sizes, so a value that
//! passes validation always fits where it is written.
//!
//! Lengths are counted in chars, except `MAX_PROPERTIES_BYTES` which bounds
//! the serialized JSON.

// === Request Limits ===

/// Maximum beacon body size in bytes (16KB).
///
/// A fully populated payload at every field limit stays well below this.
pub const MAX_BODY_BYTES: usize = 16 * 1024;

// === String Field Limits (chars) ===

/// Page path max length.
pub const MAX_PATH_LEN: usize = 512;

/// Session identifier max length.
pub const MAX_SESSION_ID_LEN: usize = 64;

/// Event type max length.
pub const MAX_EVENT_TYPE_LEN: usize = 20;

/// Custom event name max length.
pub const MAX_EVENT_NAME_LEN: usize = 100;

/// Max length of each UTM field.
pub const MAX_UTM_LEN: usize = 200;

/// Outbound/download target URL max length.
pub const MAX_TARGET_URL_LEN: usize = 1024;

/// Referrer URL max length.
pub const MAX_REFERRER_LEN: usize = 1024;

/// Custom properties JSON max size in bytes.
pub const MAX_PROPERTIES_BYTES: usize = 2048;

/// Max length of a single custom property key.
pub const MAX_PROPERTY_KEY_LEN: usize = 50;

// === Numeric Bounds ===

/// Lowest accepted scroll depth (percent).
pub const MIN_SCROLL_DEPTH: f64 = 0.0;

/// Highest accepted scroll depth (percent).
pub const MAX_SCROLL_DEPTH: f64 = 100.0;

// === Logging ===

/// Longest user-supplied value echoed into a log line.
pub const MAX_LOGGED_VALUE_LEN: usize = 64;
