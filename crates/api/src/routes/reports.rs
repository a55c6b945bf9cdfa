//! Dashboard reports, served through the report cache.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use gate_core::{require_role, validate_project_id, Role};
use serde::Deserialize;
use serde_json::Value;
use std::time::Instant;
use telemetry::metrics;
use tracing::warn;

use crate::extractors::Caller;
use crate::response::ApiError;
use crate::state::AppState;
use crate::store::{ReportKind, ReportQuery, ReportRange};

#[derive(Debug, Deserialize)]
pub struct ReportParams {
    #[serde(default)]
    pub range: ReportRange,
}

/// GET /api/projects/:project_id/reports/:report - Any signed-in role.
pub async fn report_handler(
    State(state): State<AppState>,
    caller: Caller,
    Path((project_id, report)): Path<(String, String)>,
    Query(params): Query<ReportParams>,
) -> Result<Json<Value>, ApiError> {
    require_role(caller.role, &[Role::Viewer, Role::Editor, Role::Admin])?;
    let project_id = validate_project_id(&project_id)?;
    let kind: ReportKind = report.parse()?;

    let start = Instant::now();
    metrics().report_queries.inc();

    let key = state
        .report_cache
        .key(project_id, &[kind.as_str(), params.range.as_str()]);
    let query = ReportQuery {
        project_id: project_id.to_string(),
        kind,
        range: params.range,
    };
    let reports = state.reports.clone();

    let value = state
        .report_cache
        .get_or_compute(&key, async move { reports.report(&query).await })
        .await
        .map_err(|e| {
            metrics().report_errors.inc();
            warn!(project_id = %project_id, report = %kind, error = %e, "Report failed");
            ApiError::from(e)
        })?;

    metrics()
        .report_latency_ms
        .observe(start.elapsed().as_millis() as u64);

    Ok(Json(value))
}
