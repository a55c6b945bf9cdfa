//! Public embeddable widgets, served through the widget cache.

use axum::{
    extract::{Path, State},
    Json,
};
use gate_core::validate_project_id;
use serde_json::Value;
use telemetry::metrics;
use tracing::warn;

use crate::response::ApiError;
use crate::state::AppState;
use crate::store::WidgetKind;

/// GET /api/widget/:project_id/:widget
pub async fn widget_handler(
    State(state): State<AppState>,
    Path((project_id, widget)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    let project_id = validate_project_id(&project_id)?;
    let widget: WidgetKind = widget.parse()?;

    metrics().widget_requests.inc();

    let key = state.widget_cache.key(project_id, &[widget.as_str()]);
    let reports = state.reports.clone();
    let owned_id = project_id.to_string();

    let value = state
        .widget_cache
        .get_or_compute(&key, async move { reports.widget(&owned_id, widget).await })
        .await
        .map_err(|e| {
            metrics().report_errors.inc();
            warn!(project_id = %project_id, widget = widget.as_str(), error = %e, "Widget failed");
            ApiError::from(e)
        })?;

    Ok(Json(value))
}
