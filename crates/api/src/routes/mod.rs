//! API routes.

pub mod admin;
pub mod health;
pub mod redirect;
pub mod reports;
pub mod track;
pub mod widget;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::middleware::origin_guard;
use crate::state::AppState;

/// Creates the API router.
///
/// Public routes get a permissive CORS layer. Administrative routes sit
/// behind the origin guard, and each handler checks the caller's role.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let public = Router::new()
        .route("/api/track", post(track::track_handler))
        .route("/api/widget/:project_id/:widget", get(widget::widget_handler))
        .layer(cors);

    let admin = Router::new()
        .route(
            "/api/projects/:project_id/reports/:report",
            get(reports::report_handler),
        )
        .route(
            "/api/projects/:project_id/cache/invalidate",
            post(admin::invalidate_project_handler),
        )
        .route("/api/admin/cache-stats", get(admin::cache_stats_handler))
        .route("/api/admin/metrics", get(admin::metrics_handler))
        .route(
            "/api/admin/rate-limit",
            get(admin::rate_limit_status_handler),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), origin_guard));

    Router::new()
        .merge(public)
        .merge(admin)
        .route("/auth/redirect", get(redirect::redirect_handler))
        .route("/health", get(health::health_handler))
        .route("/health/ready", get(health::ready_handler))
        .route("/health/live", get(health::live_handler))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
