//! Origin allow-list for administrative routes.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use gate_core::for_log;
use tracing::warn;

use crate::response::ApiError;
use crate::state::AppState;

/// Whether a request with this `Origin` may proceed.
///
/// Requests without an origin pass, as does everything when the allow-list
/// is empty or holds `*`. Trailing slashes are ignored.
pub fn is_origin_allowed(origin: Option<&str>, allowed: &[String]) -> bool {
    let Some(origin) = origin else {
        return true;
    };
    if allowed.is_empty() {
        return true;
    }

    let origin = origin.trim_end_matches('/');
    allowed
        .iter()
        .any(|a| a == "*" || a.trim_end_matches('/').eq_ignore_ascii_case(origin))
}

/// Reject requests from origins outside the allow-list with 403.
pub async fn origin_guard(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    // An unreadable header is treated as an unknown origin.
    let origin = request
        .headers()
        .get(header::ORIGIN)
        .map(|h| h.to_str().unwrap_or_default());

    if !is_origin_allowed(origin, &state.access.allowed_origins) {
        warn!(
            origin = %for_log(origin.unwrap_or_default()),
            path = %for_log(request.uri().path()),
            "Rejected request from disallowed origin"
        );
        return Err(ApiError::forbidden("Origin not allowed"));
    }

    Ok(next.run(request).await)
}
