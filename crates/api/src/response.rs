//! Standardized API responses.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use gate_core::error::{RateLimitErrorCode, FORBIDDEN_CODE};
use rate_limiter::RateLimitExceeded;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Reply to an accepted beacon.
#[derive(Debug, Serialize, Deserialize)]
pub struct TrackResponse {
    pub success: bool,
    pub timestamp: i64,
}

impl TrackResponse {
    pub fn accepted() -> Self {
        Self {
            success: true,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub event_sink_healthy: bool,
    pub report_source_healthy: bool,
}

/// Error response.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<String>>,
    /// Exhausted dimension of a rate-limit rejection
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit_type: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
            details: None,
            limit_type: None,
        }
    }

    pub fn with_details(mut self, details: Vec<String>) -> Self {
        self.details = Some(details);
        self
    }
}

/// API error carrying a status, a coded body and an optional `Retry-After`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub response: ErrorResponse,
    pub retry_after: Option<u64>,
}

impl ApiError {
    pub fn with_code(status: StatusCode, code: impl Into<String>, msg: impl Into<String>) -> Self {
        Self {
            status,
            response: ErrorResponse::new(msg, code),
            retry_after: None,
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::with_code(StatusCode::BAD_REQUEST, "VALID_001", msg)
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::with_code(StatusCode::FORBIDDEN, FORBIDDEN_CODE, msg)
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::with_code(StatusCode::NOT_FOUND, "NOT_FOUND", msg)
    }

    pub fn rate_limited(msg: impl Into<String>, retry_after: Option<u64>) -> Self {
        Self {
            status: StatusCode::TOO_MANY_REQUESTS,
            response: ErrorResponse::new(msg, RateLimitErrorCode::Exceeded.code()),
            retry_after,
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::with_code(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL", msg)
    }

    pub fn validation(code: impl Into<String>, errors: Vec<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            response: ErrorResponse::new("Validation failed", code).with_details(errors),
            retry_after: None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = (self.status, Json(self.response)).into_response();

        if let Some(retry_after) = self.retry_after {
            if let Ok(value) = retry_after.to_string().parse() {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }

        response
    }
}

impl From<&RateLimitExceeded> for ApiError {
    fn from(exceeded: &RateLimitExceeded) -> Self {
        // Round up so clients never retry a moment too early.
        let retry_after = exceeded.retry_after.as_millis().div_ceil(1000) as u64;
        let mut err = ApiError::rate_limited(
            format!("Rate limit exceeded for {}", exceeded.limit_type),
            Some(retry_after.max(1)),
        );
        err.response.limit_type = Some(exceeded.limit_type.as_str().to_string());
        err
    }
}

impl From<&gate_core::Error> for ApiError {
    fn from(err: &gate_core::Error) -> Self {
        use gate_core::Error;

        match err {
            Error::Auth {
                code,
                message,
                http_status,
            } => {
                let status =
                    StatusCode::from_u16(*http_status).unwrap_or(StatusCode::UNAUTHORIZED);
                ApiError::with_code(status, *code, message.clone())
            }
            Error::ValidationWithCode {
                code,
                message,
                http_status,
            } => {
                let mut api = ApiError::validation(*code, vec![message.clone()]);
                api.status = StatusCode::from_u16(*http_status).unwrap_or(StatusCode::BAD_REQUEST);
                api
            }
            Error::Forbidden(msg) => ApiError::forbidden(msg.clone()),
            Error::Validation(msg) | Error::InvalidArgument(msg) => {
                ApiError::bad_request(msg.clone())
            }
            Error::Serialization(e) => ApiError::bad_request(e.to_string()),
            Error::NotFound(msg) => ApiError::not_found(msg.clone()),
            // Config and internal details stay in the logs.
            Error::Config(_) | Error::Internal(_) => ApiError::internal("Internal error"),
        }
    }
}

impl From<gate_core::Error> for ApiError {
    fn from(err: gate_core::Error) -> Self {
        ApiError::from(&err)
    }
}

/// Errors shared between coalesced cache waiters.
impl From<Arc<gate_core::Error>> for ApiError {
    fn from(err: Arc<gate_core::Error>) -> Self {
        ApiError::from(err.as_ref())
    }
}
