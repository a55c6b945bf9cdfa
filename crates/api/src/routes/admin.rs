//! Administrative diagnostics and cache control.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use gate_core::{for_log, require_role, validate_project_id, Role};
use rate_limiter::RateLimitStatus;
use result_cache::CacheStats;
use serde::{Deserialize, Serialize};
use telemetry::{metrics, MetricsSnapshot};
use tracing::info;

use crate::extractors::{Caller, ClientIp};
use crate::response::ApiError;
use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidateResponse {
    pub project_id: String,
    pub report_entries_removed: usize,
    pub widget_entries_removed: usize,
}

#[derive(Debug, Serialize)]
pub struct CacheStatsResponse {
    pub report: CacheStats,
    pub widget: CacheStats,
}

#[derive(Debug, Deserialize)]
pub struct RateLimitParams {
    pub ip: Option<String>,
    pub key: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitStatusResponse {
    #[serde(flatten)]
    pub status: RateLimitStatus,
    pub tracked_ips: u64,
    pub tracked_api_keys: u64,
}

/// POST /api/projects/:project_id/cache/invalidate - Editors and admins.
pub async fn invalidate_project_handler(
    State(state): State<AppState>,
    caller: Caller,
    Path(project_id): Path<String>,
) -> Result<Json<InvalidateResponse>, ApiError> {
    let role = require_role(caller.role, &[Role::Editor, Role::Admin])?;
    let project_id = validate_project_id(&project_id)?;

    let report_entries_removed = state.report_cache.invalidate_project(project_id).await;
    let widget_entries_removed = state.widget_cache.invalidate_project(project_id).await;

    info!(
        project_id = %for_log(project_id),
        role = role.as_str(),
        report_entries_removed,
        widget_entries_removed,
        "Project caches invalidated"
    );

    Ok(Json(InvalidateResponse {
        project_id: project_id.to_string(),
        report_entries_removed,
        widget_entries_removed,
    }))
}

/// GET /api/admin/cache-stats
pub async fn cache_stats_handler(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Json<CacheStatsResponse>, ApiError> {
    require_role(caller.role, &[Role::Admin])?;

    Ok(Json(CacheStatsResponse {
        report: state.report_cache.stats().await,
        widget: state.widget_cache.stats().await,
    }))
}

/// GET /api/admin/metrics
pub async fn metrics_handler(caller: Caller) -> Result<Json<MetricsSnapshot>, ApiError> {
    require_role(caller.role, &[Role::Admin])?;
    Ok(Json(metrics().snapshot()))
}

/// GET /api/admin/rate-limit?ip=&key= - Remaining tokens, consuming none.
///
/// Without `ip` the caller's own address is reported.
pub async fn rate_limit_status_handler(
    State(state): State<AppState>,
    caller: Caller,
    client_ip: ClientIp,
    Query(params): Query<RateLimitParams>,
) -> Result<Json<RateLimitStatusResponse>, ApiError> {
    require_role(caller.role, &[Role::Admin])?;

    let ip = params.ip.as_deref().unwrap_or(client_ip.or_unknown());
    let key = params.key.as_deref().unwrap_or_default();

    let status = state.rate_limiter.get_rate_limit_status(ip, key);
    let (tracked_ips, tracked_api_keys) = state.rate_limiter.tracked_keys();

    Ok(Json(RateLimitStatusResponse {
        status,
        tracked_ips,
        tracked_api_keys,
    }))
}
