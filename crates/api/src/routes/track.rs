//! Beacon endpoint.
//!
//! Order of checks: site key, dual-key rate limit, body size, JSON shape,
//! field validation. Only a beacon that passes all of them is sanitized and
//! handed to the sink.

use axum::{body::Bytes, extract::State, http::StatusCode, Json};
use gate_core::{
    error::ValidationErrorCode, limits::MAX_BODY_BYTES, validate_page_view_payload,
    PageViewPayload, TrackedEvent,
};
use rate_limiter::{LimitType, RateLimitDecision};
use std::time::Instant;
use telemetry::metrics;
use tracing::{debug, error, info};

use crate::extractors::{ClientIp, SiteAuth};
use crate::response::{ApiError, TrackResponse};
use crate::state::AppState;

/// POST /api/track - Accept one analytics beacon.
pub async fn track_handler(
    State(state): State<AppState>,
    client_ip: ClientIp,
    site: SiteAuth,
    body: Bytes,
) -> Result<(StatusCode, Json<TrackResponse>), ApiError> {
    let start = Instant::now();

    metrics().beacons_received.inc();

    let decision = state
        .rate_limiter
        .check_rate_limit(client_ip.or_unknown(), site.site_key.as_str());
    if let RateLimitDecision::Exceeded(exceeded) = decision {
        match exceeded.limit_type {
            LimitType::Ip => metrics().rate_limited_ip.inc(),
            LimitType::ApiKey => metrics().rate_limited_api_key.inc(),
        }
        return Err(ApiError::from(&exceeded));
    }

    // Check payload size before parsing
    if body.len() > MAX_BODY_BYTES {
        metrics().beacons_failed_validation.inc();
        let mut err = ApiError::validation(
            ValidationErrorCode::BodyTooLarge.code(),
            vec![format!(
                "Payload size {} bytes exceeds {} byte limit",
                body.len(),
                MAX_BODY_BYTES
            )],
        );
        err.status = StatusCode::PAYLOAD_TOO_LARGE;
        return Err(err);
    }

    let payload = PageViewPayload::parse(&body).inspect_err(|_| {
        metrics().beacons_failed_validation.inc();
    })?;

    let result = validate_page_view_payload(&payload);
    if !result.is_valid {
        metrics().beacons_failed_validation.inc();
        debug!(
            project_id = %site.project_id,
            errors = result.errors.len(),
            "Beacon failed validation"
        );
        return Err(ApiError::validation(
            ValidationErrorCode::InvalidFormat.code(),
            result.errors,
        ));
    }

    let event = TrackedEvent::from_payload(payload, &site.project_id)?;
    let event_type = event.event_type;

    state.sink.store(event).await.map_err(|e| {
        metrics().sink_errors.inc();
        error!(project_id = %site.project_id, error = %e, "Failed to store beacon");
        ApiError::internal("Failed to store event")
    })?;

    metrics().beacons_accepted.inc();
    let latency_ms = start.elapsed().as_millis() as u64;
    metrics().ingest_latency_ms.observe(latency_ms);

    info!(
        project_id = %site.project_id,
        event_type = %event_type,
        latency_ms = latency_ms,
        "Beacon accepted"
    );

    Ok((StatusCode::ACCEPTED, Json(TrackResponse::accepted())))
}
