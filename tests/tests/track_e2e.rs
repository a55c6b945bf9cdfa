//! End-to-end tests for beacon ingestion.
//!
//! POST /api/track -> MockSink -> MemoryStore, then read back through the
//! widget and report endpoints.

use axum::http::StatusCode;
use gate_core::EventType;
use integration_tests::{fixtures, setup::TestContext};

#[tokio::test]
async fn test_pageview_is_accepted_and_stored() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let response = server
        .post("/api/track")
        .add_header("X-API-Key", &fixtures::site_key())
        .json(&fixtures::pageview("/pricing", "sess-1"))
        .await;

    response.assert_status(StatusCode::ACCEPTED);
    let body: serde_json::Value = response.json();
    assert_eq!(body["success"], true);
    assert!(body["timestamp"].as_i64().unwrap() > 0);

    let captured = ctx.captured_events();
    assert_eq!(captured.len(), 1);
    let event = &captured[0];
    assert_eq!(event.project_id, fixtures::expected_project_id(&fixtures::site_key()));
    assert_eq!(event.event_type, EventType::Pageview);
    assert_eq!(event.path, "/pricing");
    assert_eq!(event.session_id, "sess-1");
    assert_eq!(event.utm_campaign.as_deref(), Some("spring launch"));
    assert_eq!(event.properties, "{}");
}

#[tokio::test]
async fn test_bearer_site_key_is_accepted() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let response = server
        .post("/api/track")
        .add_header("Authorization", &fixtures::bearer(&fixtures::site_key()))
        .json(&fixtures::pageview("/", "sess-2"))
        .await;

    response.assert_status(StatusCode::ACCEPTED);
    assert_eq!(ctx.captured_events().len(), 1);
}

#[tokio::test]
async fn test_custom_event_is_sanitized_before_storage() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let response = server
        .post("/api/track")
        .add_header("X-API-Key", &fixtures::site_key())
        .json(&fixtures::custom_event("  Sign   up "))
        .await;

    response.assert_status(StatusCode::ACCEPTED);
    let captured = ctx.captured_events();
    assert_eq!(captured[0].event_type, EventType::Custom);
    assert_eq!(captured[0].event_name.as_deref(), Some("Sign up"));

    let properties: serde_json::Value = serde_json::from_str(&captured[0].properties).unwrap();
    assert_eq!(properties["plan"], "pro");
    assert_eq!(properties["seats"], 3);
}

#[tokio::test]
async fn test_scroll_and_outbound_events() {
    let ctx = TestContext::new();
    let server = ctx.server();

    server
        .post("/api/track")
        .add_header("X-API-Key", &fixtures::site_key())
        .json(&fixtures::scroll_event(75.0))
        .await
        .assert_status(StatusCode::ACCEPTED);

    server
        .post("/api/track")
        .add_header("X-API-Key", &fixtures::site_key())
        .json(&fixtures::outbound_event("https://partner.example.net/landing"))
        .await
        .assert_status(StatusCode::ACCEPTED);

    let captured = ctx.captured_events();
    assert_eq!(captured.len(), 2);
    assert_eq!(captured[0].scroll_depth, Some(75.0));
    assert_eq!(
        captured[1].target_url.as_deref(),
        Some("https://partner.example.net/landing")
    );
}

#[tokio::test]
async fn test_tracked_beacons_show_up_in_widget_after_invalidation() {
    let ctx = TestContext::new();
    let server = ctx.server();
    let project_id = fixtures::expected_project_id(&fixtures::site_key());
    let widget_path = format!("/api/widget/{}/visitors", project_id);

    // Prime the widget cache while the project is empty.
    let response = server.get(&widget_path).await;
    response.assert_status_ok();
    assert_eq!(response.json::<serde_json::Value>()["value"], 0);

    for session in ["sess-a", "sess-b", "sess-a"] {
        server
            .post("/api/track")
            .add_header("X-API-Key", &fixtures::site_key())
            .json(&fixtures::pageview("/", session))
            .await
            .assert_status(StatusCode::ACCEPTED);
    }

    // Still served from cache.
    let cached: serde_json::Value = server.get(&widget_path).await.json();
    assert_eq!(cached["value"], 0);
    assert_eq!(ctx.reports.widget_calls(), 1);

    server
        .post(&format!("/api/projects/{}/cache/invalidate", project_id))
        .add_header("Authorization", &fixtures::bearer(fixtures::EDITOR_TOKEN))
        .await
        .assert_status_ok();

    let fresh: serde_json::Value = server.get(&widget_path).await.json();
    assert_eq!(fresh["value"], 2);
    assert_eq!(ctx.reports.widget_calls(), 2);
}

#[tokio::test]
async fn test_projects_are_isolated_in_reports() {
    let ctx = TestContext::new();
    let server = ctx.server();

    for (key, path) in [
        (fixtures::site_key(), "/a"),
        (fixtures::site_key(), "/a"),
        (fixtures::other_site_key(), "/b"),
    ] {
        server
            .post("/api/track")
            .add_header("X-API-Key", &key)
            .json(&fixtures::pageview(path, "sess-iso"))
            .await
            .assert_status(StatusCode::ACCEPTED);
    }

    let project_id = fixtures::expected_project_id(&fixtures::site_key());
    let report: serde_json::Value = server
        .get(&format!("/api/projects/{}/reports/pages", project_id))
        .add_query_param("range", "24h")
        .add_header("Authorization", &fixtures::bearer(fixtures::VIEWER_TOKEN))
        .await
        .json();

    assert_eq!(report["range"], "24h");
    let rows = report["data"].as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["path"], "/a");
    assert_eq!(rows[0]["count"], 2);
}
