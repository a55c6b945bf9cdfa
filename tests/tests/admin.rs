//! Origin guard, role guard, report caching and diagnostics.

use api::extractors::AdminSession;
use axum::http::StatusCode;
use axum::Extension;
use axum_test::TestServer;
use gate_core::Role;
use integration_tests::{fixtures, setup::TestContext};
use serde_json::Value;

fn report_path(project_id: &str, report: &str) -> String {
    format!("/api/projects/{}/reports/{}", project_id, report)
}

fn project_id() -> String {
    fixtures::expected_project_id(&fixtures::site_key())
}

#[tokio::test]
async fn test_disallowed_origin_is_forbidden() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let response = server
        .get("/api/admin/metrics")
        .add_header("Origin", "https://evil.example")
        .add_header("Authorization", &fixtures::bearer(fixtures::ADMIN_TOKEN))
        .await;

    response.assert_status(StatusCode::FORBIDDEN);
    let body: Value = response.json();
    assert_eq!(body["code"], "FORBIDDEN");
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_listed_or_missing_origin_passes() {
    let ctx = TestContext::new();
    let server = ctx.server();

    server
        .get("/api/admin/metrics")
        .add_header("Origin", fixtures::DASHBOARD_ORIGIN)
        .add_header("Authorization", &fixtures::bearer(fixtures::ADMIN_TOKEN))
        .await
        .assert_status_ok();

    server
        .get("/api/admin/metrics")
        .add_header("Authorization", &fixtures::bearer(fixtures::ADMIN_TOKEN))
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn test_public_routes_ignore_origin_allow_list() {
    let ctx = TestContext::new();
    let server = ctx.server();

    server
        .post("/api/track")
        .add_header("Origin", "https://customer-site.example")
        .add_header("X-API-Key", &fixtures::site_key())
        .json(&fixtures::pageview("/", "sess-1"))
        .await
        .assert_status(StatusCode::ACCEPTED);

    server
        .get(&format!("/api/widget/{}/pageviews", project_id()))
        .add_header("Origin", "https://customer-site.example")
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn test_missing_or_unknown_role_is_forbidden() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let response = server.get(&report_path(&project_id(), "overview")).await;
    response.assert_status(StatusCode::FORBIDDEN);
    assert_eq!(response.json::<Value>()["code"], "FORBIDDEN");

    server
        .get(&report_path(&project_id(), "overview"))
        .add_header("Authorization", "Bearer not-a-token")
        .await
        .assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_role_permissions() {
    let ctx = TestContext::new();
    let server = ctx.server();
    let invalidate = format!("/api/projects/{}/cache/invalidate", project_id());

    // Viewers read reports but cannot invalidate or see diagnostics.
    server
        .get(&report_path(&project_id(), "overview"))
        .add_header("Authorization", &fixtures::bearer(fixtures::VIEWER_TOKEN))
        .await
        .assert_status_ok();
    server
        .post(&invalidate)
        .add_header("Authorization", &fixtures::bearer(fixtures::VIEWER_TOKEN))
        .await
        .assert_status(StatusCode::FORBIDDEN);

    // Editors invalidate but cannot see diagnostics.
    server
        .post(&invalidate)
        .add_header("Authorization", &fixtures::bearer(fixtures::EDITOR_TOKEN))
        .await
        .assert_status_ok();
    server
        .get("/api/admin/cache-stats")
        .add_header("Authorization", &fixtures::bearer(fixtures::EDITOR_TOKEN))
        .await
        .assert_status(StatusCode::FORBIDDEN);

    server
        .get("/api/admin/cache-stats")
        .add_header("Authorization", &fixtures::bearer(fixtures::ADMIN_TOKEN))
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn test_session_role_is_used_without_bearer_token() {
    let ctx = TestContext::new();
    let router = ctx.router.clone().layer(Extension(AdminSession {
        user_id: "user-1".to_string(),
        role: Some(Role::Admin),
    }));
    let server = TestServer::new(router).expect("Failed to create test server");

    server.get("/api/admin/metrics").await.assert_status_ok();

    let router = ctx.router.clone().layer(Extension(AdminSession {
        user_id: "user-2".to_string(),
        role: None,
    }));
    let server = TestServer::new(router).expect("Failed to create test server");

    server
        .get("/api/admin/metrics")
        .await
        .assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_report_is_cached_until_invalidated() {
    let ctx = TestContext::new();
    let server = ctx.server();
    let path = report_path(&project_id(), "overview");
    let viewer = fixtures::bearer(fixtures::VIEWER_TOKEN);

    for _ in 0..3 {
        server
            .get(&path)
            .add_header("Authorization", &viewer)
            .await
            .assert_status_ok();
    }
    assert_eq!(ctx.reports.report_calls(), 1);

    // A different range is a different key.
    server
        .get(&path)
        .add_query_param("range", "30d")
        .add_header("Authorization", &viewer)
        .await
        .assert_status_ok();
    assert_eq!(ctx.reports.report_calls(), 2);

    let response = server
        .post(&format!("/api/projects/{}/cache/invalidate", project_id()))
        .add_header("Authorization", &fixtures::bearer(fixtures::ADMIN_TOKEN))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["reportEntriesRemoved"], 2);
    assert_eq!(body["widgetEntriesRemoved"], 0);

    server
        .get(&path)
        .add_header("Authorization", &viewer)
        .await
        .assert_status_ok();
    assert_eq!(ctx.reports.report_calls(), 3);
}

#[tokio::test]
async fn test_failed_report_is_not_cached() {
    let ctx = TestContext::new();
    let server = ctx.server();
    let path = report_path(&project_id(), "pages");
    let viewer = fixtures::bearer(fixtures::VIEWER_TOKEN);

    ctx.reports.set_should_fail(true);
    server
        .get(&path)
        .add_header("Authorization", &viewer)
        .await
        .assert_status(StatusCode::INTERNAL_SERVER_ERROR);

    ctx.reports.set_should_fail(false);
    server
        .get(&path)
        .add_header("Authorization", &viewer)
        .await
        .assert_status_ok();
    assert_eq!(ctx.reports.report_calls(), 2);
}

#[tokio::test]
async fn test_unknown_report_and_bad_project_id() {
    let ctx = TestContext::new();
    let server = ctx.server();
    let viewer = fixtures::bearer(fixtures::VIEWER_TOKEN);

    let response = server
        .get(&report_path(&project_id(), "secrets"))
        .add_header("Authorization", &viewer)
        .await;
    response.assert_status(StatusCode::NOT_FOUND);

    server
        .get(&report_path("bad:project", "overview"))
        .add_header("Authorization", &viewer)
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    server
        .get("/api/widget/bad:project/visitors")
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(ctx.reports.report_calls(), 0);
    assert_eq!(ctx.reports.widget_calls(), 0);
}

#[tokio::test]
async fn test_cache_stats_reports_hits_and_misses() {
    let ctx = TestContext::new();
    let server = ctx.server();
    let widget = format!("/api/widget/{}/visitors", project_id());

    server.get(&widget).await.assert_status_ok();
    server.get(&widget).await.assert_status_ok();

    let stats: Value = server
        .get("/api/admin/cache-stats")
        .add_header("Authorization", &fixtures::bearer(fixtures::ADMIN_TOKEN))
        .await
        .json();

    assert_eq!(stats["widget"]["name"], "widget");
    assert_eq!(stats["widget"]["size"], 1);
    assert_eq!(stats["widget"]["hitCount"], 1);
    assert_eq!(stats["widget"]["missCount"], 1);
    assert_eq!(stats["report"]["size"], 0);
}

#[tokio::test]
async fn test_rate_limit_status_consumes_nothing() {
    let ctx = TestContext::with_limits(5, 10);
    let server = ctx.server();

    server
        .post("/api/track")
        .add_header("X-API-Key", &fixtures::site_key())
        .add_header("X-Forwarded-For", "203.0.113.9")
        .json(&fixtures::pageview("/", "sess-1"))
        .await
        .assert_status(StatusCode::ACCEPTED);

    for _ in 0..2 {
        let status: Value = server
            .get("/api/admin/rate-limit")
            .add_query_param("ip", "203.0.113.9")
            .add_query_param("key", fixtures::site_key())
            .add_header("Authorization", &fixtures::bearer(fixtures::ADMIN_TOKEN))
            .await
            .json();

        assert_eq!(status["ipRemaining"], 4);
        assert_eq!(status["ipLimit"], 5);
        assert_eq!(status["apiKeyRemaining"], 9);
        assert_eq!(status["apiKeyLimit"], 10);
    }

    // Never-seen keys report the full limit.
    let status: Value = server
        .get("/api/admin/rate-limit")
        .add_query_param("ip", "198.51.100.200")
        .add_query_param("key", "never_seen_key")
        .add_header("Authorization", &fixtures::bearer(fixtures::ADMIN_TOKEN))
        .await
        .json();
    assert_eq!(status["ipRemaining"], 5);
    assert_eq!(status["apiKeyRemaining"], 10);
}
