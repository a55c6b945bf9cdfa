//! Tests for health check endpoints.

use axum::http::StatusCode;
use integration_tests::setup::TestContext;
use telemetry::health;

#[tokio::test]
async fn test_health_endpoint_structure() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let response = server.get("/health").await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    let status = body["status"].as_str().unwrap_or("");
    assert!(
        status == "healthy" || status == "degraded" || status == "unhealthy",
        "unexpected status '{}'",
        status
    );
    assert!(body["eventSinkHealthy"].is_boolean());
    assert!(body["reportSourceHealthy"].is_boolean());
}

#[tokio::test]
async fn test_ready_follows_event_sink_health() {
    let ctx = TestContext::new();
    let server = ctx.server();

    health().event_sink.set_unhealthy("maintenance");
    server
        .get("/health/ready")
        .await
        .assert_status(StatusCode::SERVICE_UNAVAILABLE);

    health().event_sink.set_healthy();
    server.get("/health/ready").await.assert_status_ok();
}

#[tokio::test]
async fn test_live_endpoint() {
    let ctx = TestContext::new();
    let server = ctx.server();

    server.get("/health/live").await.assert_status_ok();
}

#[tokio::test]
async fn test_health_endpoints_no_auth_required() {
    let ctx = TestContext::new();
    let server = ctx.server();

    for path in ["/health", "/health/ready", "/health/live"] {
        let response = server.get(path).await;
        assert_ne!(response.status_code(), StatusCode::UNAUTHORIZED, "{}", path);
        assert_ne!(response.status_code(), StatusCode::FORBIDDEN, "{}", path);
    }
}
