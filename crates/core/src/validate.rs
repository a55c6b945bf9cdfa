//! Field-level validation of inbound beacons.
//!
//! `validate_page_view_payload` checks every field against its length
//! bound, its character allow-list and the cross-field rules for the event
//! type, and collects every violation in order. The `validate_and_sanitize_*`
//! helpers are the fail-fast counterparts for single values.

use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::sync::LazyLock;

use crate::error::{Error, Result};
use crate::limits::{
    MAX_EVENT_NAME_LEN, MAX_EVENT_TYPE_LEN, MAX_PATH_LEN, MAX_PROPERTIES_BYTES,
    MAX_PROPERTY_KEY_LEN, MAX_REFERRER_LEN, MAX_SCROLL_DEPTH, MAX_SESSION_ID_LEN,
    MAX_TARGET_URL_LEN, MAX_UTM_LEN, MIN_SCROLL_DEPTH,
};
use crate::payload::{EventType, PageViewPayload};
use crate::sanitize::sanitize;

static PATH_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^/[A-Za-z0-9/_.~%?&=+#:@!,;()-]*$").expect("invalid path pattern")
});

static SESSION_ID_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("invalid session id pattern"));

static EVENT_NAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9 _.:/-]+$").expect("invalid event name pattern"));

static UTM_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9 _.+%-]+$").expect("invalid utm pattern"));

static URL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9._~:/?#\[\]@!$&'()*+,;=%-]+$").expect("invalid url pattern")
});

static PROJECT_ID_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{1,64}$").expect("invalid project id pattern"));

static PROPERTY_KEY_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_.-]+$").expect("invalid property key pattern"));

/// Outcome of validating a whole payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub is_valid: bool,
    /// Every violation found, in field order.
    pub errors: Vec<String>,
}

impl ValidationResult {
    fn from_errors(errors: Vec<String>) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
        }
    }
}

/// Treat empty strings the same as missing values.
fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Append length and allow-list violations for one string field.
fn check_text(errors: &mut Vec<String>, label: &str, value: &str, max_len: usize, regex: &Regex) {
    if value.chars().count() > max_len {
        errors.push(format!("{} must be at most {} characters", label, max_len));
    }
    if !regex.is_match(value) {
        errors.push(format!("{} contains invalid characters", label));
    }
}

fn check_path(errors: &mut Vec<String>, path: Option<&str>) {
    let Some(path) = path else {
        errors.push("path is required".to_string());
        return;
    };
    if !path.starts_with('/') {
        errors.push("path must start with '/'".to_string());
        if path.chars().count() > MAX_PATH_LEN {
            errors.push(format!("path must be at most {} characters", MAX_PATH_LEN));
        }
        return;
    }
    check_text(errors, "path", path, MAX_PATH_LEN, &PATH_REGEX);
}

fn check_session_id(errors: &mut Vec<String>, session_id: Option<&str>) {
    match session_id {
        Some(id) => check_text(errors, "session id", id, MAX_SESSION_ID_LEN, &SESSION_ID_REGEX),
        None => errors.push("session id is required".to_string()),
    }
}

fn check_event_type(errors: &mut Vec<String>, event_type: Option<&str>) -> Option<EventType> {
    let Some(raw) = event_type else {
        errors.push("event type is required".to_string());
        return None;
    };
    if raw.chars().count() > MAX_EVENT_TYPE_LEN {
        errors.push(format!(
            "event type must be at most {} characters",
            MAX_EVENT_TYPE_LEN
        ));
    }
    match raw.parse::<EventType>() {
        Ok(event_type) => Some(event_type),
        Err(_) => {
            errors.push(format!(
                "event type must be one of: {}",
                EventType::allowed_list()
            ));
            None
        }
    }
}

fn check_event_name(
    errors: &mut Vec<String>,
    event_type: Option<EventType>,
    event_name: Option<&str>,
) {
    if let Some(name) = event_name {
        check_text(errors, "event name", name, MAX_EVENT_NAME_LEN, &EVENT_NAME_REGEX);
    }
    let Some(event_type) = event_type else {
        return;
    };
    match (event_type.requires_event_name(), event_name.is_some()) {
        (true, false) => errors.push(format!(
            "event name is required for {} events",
            event_type
        )),
        (false, true) => errors.push(format!(
            "event name should not be provided for {} events",
            event_type
        )),
        _ => {}
    }
}

fn check_scroll_depth(
    errors: &mut Vec<String>,
    event_type: Option<EventType>,
    scroll_depth: Option<f64>,
) {
    match scroll_depth {
        Some(depth) if !(MIN_SCROLL_DEPTH..=MAX_SCROLL_DEPTH).contains(&depth) => {
            errors.push(format!(
                "scroll depth must be between {} and {}",
                MIN_SCROLL_DEPTH, MAX_SCROLL_DEPTH
            ));
        }
        None if event_type == Some(EventType::Scroll) => {
            errors.push("scroll depth is required for scroll events".to_string());
        }
        _ => {}
    }
}

fn check_target_url(
    errors: &mut Vec<String>,
    event_type: Option<EventType>,
    target_url: Option<&str>,
) {
    let Some(target) = target_url else {
        if let Some(event_type) = event_type.filter(|t| t.requires_target_url()) {
            errors.push(format!("target URL is required for {} events", event_type));
        }
        return;
    };

    let before = errors.len();
    check_text(errors, "target URL", target, MAX_TARGET_URL_LEN, &URL_REGEX);
    if errors.len() == before && !is_absolute_http_url(target) {
        errors.push("target URL must be an absolute http or https URL".to_string());
    }
}

fn is_absolute_http_url(value: &str) -> bool {
    url::Url::parse(value)
        .map(|u| matches!(u.scheme(), "http" | "https") && u.host().is_some())
        .unwrap_or(false)
}

fn check_properties(errors: &mut Vec<String>, properties: Option<&Value>) {
    let map = match properties {
        None | Some(Value::Null) => return,
        Some(Value::Object(map)) => map,
        Some(_) => {
            errors.push("properties must be a JSON object".to_string());
            return;
        }
    };

    let serialized_len = serde_json::to_string(map).map(|s| s.len()).unwrap_or(usize::MAX);
    if serialized_len > MAX_PROPERTIES_BYTES {
        errors.push(format!(
            "properties must be at most {} bytes when serialized",
            MAX_PROPERTIES_BYTES
        ));
    }

    let bad_key = map
        .keys()
        .any(|k| k.chars().count() > MAX_PROPERTY_KEY_LEN || !PROPERTY_KEY_REGEX.is_match(k));
    if bad_key {
        errors.push(format!(
            "properties keys must be 1-{} characters of letters, digits, '_', '.' or '-'",
            MAX_PROPERTY_KEY_LEN
        ));
    }

    if map.values().any(contains_control_chars) {
        errors.push("properties values must not contain control characters".to_string());
    }
}

fn contains_control_chars(value: &Value) -> bool {
    match value {
        Value::String(s) => s.chars().any(|c| c <= '\u{1f}' || c == '\u{7f}'),
        Value::Array(items) => items.iter().any(contains_control_chars),
        Value::Object(map) => map.values().any(contains_control_chars),
        _ => false,
    }
}

/// Report a field that arrived with the wrong JSON type. Its other rules
/// are skipped.
fn check_type(
    errors: &mut Vec<String>,
    payload: &PageViewPayload,
    key: &str,
    label: &str,
    expected: &str,
) -> bool {
    if payload.is_mistyped(key) {
        errors.push(format!("{} must be {}", label, expected));
        true
    } else {
        false
    }
}

/// Validate every field of a beacon, collecting all violations.
pub fn validate_page_view_payload(payload: &PageViewPayload) -> ValidationResult {
    let mut errors = Vec::new();
    let errs = &mut errors;

    if !check_type(errs, payload, "path", "path", "a string") {
        check_path(errs, present(&payload.path));
    }
    if !check_type(errs, payload, "sessionId", "session id", "a string") {
        check_session_id(errs, present(&payload.session_id));
    }
    let event_type = if check_type(errs, payload, "type", "event type", "a string") {
        None
    } else {
        check_event_type(errs, present(&payload.event_type))
    };
    if !check_type(errs, payload, "eventName", "event name", "a string") {
        check_event_name(errs, event_type, present(&payload.event_name));
    }
    if !check_type(errs, payload, "scrollDepth", "scroll depth", "a number") {
        check_scroll_depth(errs, event_type, payload.scroll_depth);
    }
    if !check_type(errs, payload, "targetUrl", "target URL", "a string") {
        check_target_url(errs, event_type, present(&payload.target_url));
    }

    if !check_type(errs, payload, "referrer", "referrer", "a string") {
        if let Some(referrer) = present(&payload.referrer) {
            check_text(errs, "referrer", referrer, MAX_REFERRER_LEN, &URL_REGEX);
        }
    }

    let utm_fields = [
        ("utmSource", "utm_source", &payload.utm_source),
        ("utmMedium", "utm_medium", &payload.utm_medium),
        ("utmCampaign", "utm_campaign", &payload.utm_campaign),
        ("utmTerm", "utm_term", &payload.utm_term),
        ("utmContent", "utm_content", &payload.utm_content),
    ];
    for (key, label, value) in utm_fields {
        if check_type(errs, payload, key, label, "a string") {
            continue;
        }
        if let Some(value) = present(value) {
            check_text(errs, label, value, MAX_UTM_LEN, &UTM_REGEX);
        }
    }

    check_properties(errs, payload.properties.as_ref());

    ValidationResult::from_errors(errors)
}

/// Sanitize a path and reject it unless it is a valid page path.
pub fn validate_and_sanitize_path(input: &str) -> Result<String> {
    let path = sanitize(input);
    if path.is_empty() {
        return Err(Error::invalid_argument("path is required"));
    }
    if path.chars().count() > MAX_PATH_LEN {
        return Err(Error::invalid_argument(format!(
            "path must be at most {} characters",
            MAX_PATH_LEN
        )));
    }
    if !PATH_REGEX.is_match(&path) {
        return Err(Error::invalid_argument("path contains invalid characters"));
    }
    Ok(path)
}

/// Sanitize a session id and reject it unless it is well formed.
pub fn validate_and_sanitize_session_id(input: &str) -> Result<String> {
    let session_id = sanitize(input);
    if session_id.is_empty() {
        return Err(Error::invalid_argument("session id is required"));
    }
    if session_id.chars().count() > MAX_SESSION_ID_LEN {
        return Err(Error::invalid_argument(format!(
            "session id must be at most {} characters",
            MAX_SESSION_ID_LEN
        )));
    }
    if !SESSION_ID_REGEX.is_match(&session_id) {
        return Err(Error::invalid_argument(
            "session id contains invalid characters",
        ));
    }
    Ok(session_id)
}

/// Reject project ids that could break cache-key scoping.
pub fn validate_project_id(input: &str) -> Result<&str> {
    if PROJECT_ID_REGEX.is_match(input) {
        Ok(input)
    } else {
        Err(Error::invalid_argument(
            "project id must be 1-64 characters of letters, digits, '_' or '-'",
        ))
    }
}
