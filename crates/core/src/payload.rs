//! Beacon payload types and transformation to the stored form.
//!
//! This module handles:
//! - Parsing tracking-script beacons (camelCase JSON)
//! - The fixed set of event types and their per-type requirements
//! - Transforming a validated payload into a sanitized `TrackedEvent`

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result, ValidationErrorCode};
use crate::sanitize::sanitize;

/// All accepted event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Pageview,
    Heartbeat,
    Custom,
    Scroll,
    Outbound,
    Download,
}

impl EventType {
    pub const ALL: [EventType; 6] = [
        Self::Pageview,
        Self::Heartbeat,
        Self::Custom,
        Self::Scroll,
        Self::Outbound,
        Self::Download,
    ];

    /// Returns the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pageview => "pageview",
            Self::Heartbeat => "heartbeat",
            Self::Custom => "custom",
            Self::Scroll => "scroll",
            Self::Outbound => "outbound",
            Self::Download => "download",
        }
    }

    /// Whether events of this type must carry an event name.
    ///
    /// All other types must not carry one.
    pub fn requires_event_name(&self) -> bool {
        matches!(self, Self::Custom | Self::Outbound | Self::Download)
    }

    /// Whether events of this type must carry a target URL.
    pub fn requires_target_url(&self) -> bool {
        matches!(self, Self::Outbound | Self::Download)
    }

    /// Comma-separated list of every accepted type, for error messages.
    pub fn allowed_list() -> String {
        Self::ALL
            .iter()
            .map(|t| t.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| Error::validation(format!("unknown event type: {}", s)))
    }
}

/// JSON keys of the text fields.
const TEXT_FIELDS: [&str; 11] = [
    "path",
    "sessionId",
    "type",
    "eventName",
    "targetUrl",
    "referrer",
    "utmSource",
    "utmMedium",
    "utmCampaign",
    "utmTerm",
    "utmContent",
];

/// JSON keys of the numeric fields.
const NUMBER_FIELDS: [&str; 1] = ["scrollDepth"];

/// Beacon as received from the tracking script.
///
/// Every field is optional at the serde level so that a single validation
/// pass can report all missing and malformed fields together. A field of
/// the wrong JSON type is dropped by [`PageViewPayload::parse`] and listed
/// in `mistyped` instead of failing the whole parse.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageViewPayload {
    /// Page path, e.g. `/pricing`
    pub path: Option<String>,

    /// Visitor session identifier
    pub session_id: Option<String>,

    /// Event type, one of `EventType`
    #[serde(rename = "type")]
    pub event_type: Option<String>,

    /// Name for custom, outbound and download events
    pub event_name: Option<String>,

    /// Scroll depth percentage
    pub scroll_depth: Option<f64>,

    /// Link target for outbound and download events
    pub target_url: Option<String>,

    /// Referring page
    pub referrer: Option<String>,

    pub utm_source: Option<String>,
    pub utm_medium: Option<String>,
    pub utm_campaign: Option<String>,
    pub utm_term: Option<String>,
    pub utm_content: Option<String>,

    /// Free-form custom properties
    pub properties: Option<Value>,

    /// JSON keys whose values had the wrong type
    #[serde(skip)]
    pub mistyped: Vec<&'static str>,
}

impl PageViewPayload {
    /// Parse a beacon body.
    ///
    /// Only malformed JSON or a non-object body fails here; per-field type
    /// errors are left for validation.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(bytes).map_err(invalid_json)?;
        let Value::Object(mut fields) = value else {
            return Err(Error::validation_code(
                ValidationErrorCode::InvalidFormat,
                "payload must be a JSON object",
            ));
        };

        let mut mistyped = Vec::new();
        for key in TEXT_FIELDS {
            if fields.get(key).is_some_and(|v| !v.is_null() && !v.is_string()) {
                fields.remove(key);
                mistyped.push(key);
            }
        }
        for key in NUMBER_FIELDS {
            if fields.get(key).is_some_and(|v| !v.is_null() && !v.is_number()) {
                fields.remove(key);
                mistyped.push(key);
            }
        }

        let mut payload: Self =
            serde_json::from_value(Value::Object(fields)).map_err(invalid_json)?;
        payload.mistyped = mistyped;
        Ok(payload)
    }

    /// Whether the field under this JSON key had the wrong type.
    pub fn is_mistyped(&self, key: &str) -> bool {
        self.mistyped.iter().any(|k| *k == key)
    }
}

fn invalid_json(e: serde_json::Error) -> Error {
    Error::validation_code(
        ValidationErrorCode::InvalidFormat,
        format!("invalid JSON: {}", e),
    )
}

/// Event row handed to the storage layer (snake_case).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedEvent {
    pub project_id: String,
    pub session_id: String,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub path: String,
    pub event_name: Option<String>,
    pub scroll_depth: Option<f64>,
    pub target_url: Option<String>,
    pub referrer: Option<String>,
    pub utm_source: Option<String>,
    pub utm_medium: Option<String>,
    pub utm_campaign: Option<String>,
    pub utm_term: Option<String>,
    pub utm_content: Option<String>,
    /// JSON string of custom properties
    pub properties: String,
    /// Milliseconds since epoch, server clock
    pub received_at: i64,
}

impl TrackedEvent {
    /// Transform a payload that already passed validation.
    ///
    /// String fields are sanitized so the stored form is canonical.
    pub fn from_payload(payload: PageViewPayload, project_id: &str) -> Result<Self> {
        let event_type: EventType = payload
            .event_type
            .as_deref()
            .ok_or_else(|| Error::validation("event type is required"))?
            .parse()?;

        let path = payload
            .path
            .as_deref()
            .map(sanitize)
            .ok_or_else(|| Error::validation("path is required"))?;

        let session_id = payload
            .session_id
            .as_deref()
            .map(sanitize)
            .ok_or_else(|| Error::validation("session id is required"))?;

        let properties = match payload.properties {
            Some(Value::Null) | None => "{}".to_string(),
            Some(value) => serde_json::to_string(&value)?,
        };

        Ok(Self {
            project_id: project_id.to_string(),
            session_id,
            event_type,
            path,
            event_name: clean(payload.event_name),
            scroll_depth: payload.scroll_depth,
            target_url: clean(payload.target_url),
            referrer: clean(payload.referrer),
            utm_source: clean(payload.utm_source),
            utm_medium: clean(payload.utm_medium),
            utm_campaign: clean(payload.utm_campaign),
            utm_term: clean(payload.utm_term),
            utm_content: clean(payload.utm_content),
            properties,
            received_at: Utc::now().timestamp_millis(),
        })
    }
}

/// Sanitize an optional field, dropping values that sanitize to nothing.
fn clean(value: Option<String>) -> Option<String> {
    value.map(|v| sanitize(&v)).filter(|v| !v.is_empty())
}
