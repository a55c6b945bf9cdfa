//! Error handling on the beacon endpoint.
//!
//! Every rejection must leave the sink untouched.

use api::ProxyTrust;
use axum::http::StatusCode;
use integration_tests::{fixtures, setup::TestContext};
use serde_json::{json, Value};

#[tokio::test]
async fn test_missing_site_key_returns_401() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let response = server
        .post("/api/track")
        .json(&fixtures::pageview("/", "sess-1"))
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
    let body: Value = response.json();
    assert_eq!(body["code"], "AUTH_001");
    assert!(ctx.captured_events().is_empty());
}

#[tokio::test]
async fn test_malformed_site_key_returns_401() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let response = server
        .post("/api/track")
        .add_header("X-API-Key", "bad key!")
        .json(&fixtures::pageview("/", "sess-1"))
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
    let body: Value = response.json();
    assert_eq!(body["code"], "AUTH_002");
}

#[tokio::test]
async fn test_invalid_json_returns_valid_001() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let response = server
        .post("/api/track")
        .content_type("application/json")
        .add_header("X-API-Key", &fixtures::site_key())
        .text("{not json")
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["code"], "VALID_001");
    assert!(ctx.captured_events().is_empty());
}

#[tokio::test]
async fn test_oversized_body_returns_valid_002() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let response = server
        .post("/api/track")
        .content_type("application/json")
        .add_header("X-API-Key", &fixtures::site_key())
        .text(fixtures::oversized_body())
        .await;

    response.assert_status(StatusCode::PAYLOAD_TOO_LARGE);
    let body: Value = response.json();
    assert_eq!(body["code"], "VALID_002");
}

#[tokio::test]
async fn test_validation_reports_every_error() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let response = server
        .post("/api/track")
        .add_header("X-API-Key", &fixtures::site_key())
        .json(&json!({
            "path": "pricing",
            "type": "scroll",
            "eventName": "oops"
        }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["code"], "VALID_001");
    assert_eq!(body["error"], "Validation failed");

    let details: Vec<String> = serde_json::from_value(body["details"].clone()).unwrap();
    assert!(details.contains(&"path must start with '/'".to_string()));
    assert!(details.contains(&"session id is required".to_string()));
    assert!(details.contains(&"scroll depth is required for scroll events".to_string()));
    assert!(details.contains(&"event name should not be provided for scroll events".to_string()));
    assert!(ctx.captured_events().is_empty());
}

#[tokio::test]
async fn test_mistyped_field_does_not_hide_other_errors() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let response = server
        .post("/api/track")
        .add_header("X-API-Key", &fixtures::site_key())
        .json(&json!({
            "path": "/ok",
            "sessionId": 12345,
            "type": "scroll"
        }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["code"], "VALID_001");
    assert_eq!(
        body["details"],
        json!([
            "session id must be a string",
            "scroll depth is required for scroll events"
        ])
    );
    assert!(ctx.captured_events().is_empty());
}

#[tokio::test]
async fn test_pageview_with_event_name_is_rejected() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let mut beacon = fixtures::pageview("/", "sess-1");
    beacon["eventName"] = json!("signup");

    let response = server
        .post("/api/track")
        .add_header("X-API-Key", &fixtures::site_key())
        .json(&beacon)
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(
        body["details"],
        json!(["event name should not be provided for pageview events"])
    );
}

#[tokio::test]
async fn test_ip_limit_returns_429_with_retry_after() {
    let ctx = TestContext::with_limits(2, 100);
    let server = ctx.server();

    for _ in 0..2 {
        server
            .post("/api/track")
            .add_header("X-API-Key", &fixtures::site_key())
            .add_header("X-Forwarded-For", "203.0.113.7")
            .json(&fixtures::pageview("/", "sess-1"))
            .await
            .assert_status(StatusCode::ACCEPTED);
    }

    let response = server
        .post("/api/track")
        .add_header("X-API-Key", &fixtures::site_key())
        .add_header("X-Forwarded-For", "203.0.113.7")
        .json(&fixtures::pageview("/", "sess-1"))
        .await;

    response.assert_status(StatusCode::TOO_MANY_REQUESTS);
    let body: Value = response.json();
    assert_eq!(body["code"], "RATE_001");
    assert_eq!(body["limitType"], "ip");

    let retry_after: u64 = response
        .header("Retry-After")
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!((1..=60).contains(&retry_after));
    assert_eq!(ctx.captured_events().len(), 2);

    // Another address is unaffected.
    server
        .post("/api/track")
        .add_header("X-API-Key", &fixtures::site_key())
        .add_header("X-Forwarded-For", "198.51.100.1")
        .json(&fixtures::pageview("/", "sess-2"))
        .await
        .assert_status(StatusCode::ACCEPTED);
}

#[tokio::test]
async fn test_site_key_limit_applies_across_addresses() {
    let ctx = TestContext::with_limits(100, 3);
    let server = ctx.server();

    for i in 0..3 {
        server
            .post("/api/track")
            .add_header("X-API-Key", &fixtures::site_key())
            .add_header("X-Forwarded-For", &format!("192.0.2.{}", i))
            .json(&fixtures::pageview("/", "sess-1"))
            .await
            .assert_status(StatusCode::ACCEPTED);
    }

    let response = server
        .post("/api/track")
        .add_header("X-API-Key", &fixtures::site_key())
        .add_header("X-Forwarded-For", "192.0.2.99")
        .json(&fixtures::pageview("/", "sess-1"))
        .await;

    response.assert_status(StatusCode::TOO_MANY_REQUESTS);
    let body: Value = response.json();
    assert_eq!(body["limitType"], "api_key");

    // A different site has its own bucket.
    server
        .post("/api/track")
        .add_header("X-API-Key", &fixtures::other_site_key())
        .add_header("X-Forwarded-For", "192.0.2.99")
        .json(&fixtures::pageview("/", "sess-1"))
        .await
        .assert_status(StatusCode::ACCEPTED);
}

#[tokio::test]
async fn test_rotating_forwarded_for_is_ignored_without_trust() {
    let ctx = TestContext::with_proxy_trust(2, 100, ProxyTrust::default());
    let server = ctx.server();

    for i in 0..2 {
        server
            .post("/api/track")
            .add_header("X-API-Key", &fixtures::site_key())
            .add_header("X-Forwarded-For", &format!("203.0.113.{}", i))
            .json(&fixtures::pageview("/", "sess-1"))
            .await
            .assert_status(StatusCode::ACCEPTED);
    }

    let response = server
        .post("/api/track")
        .add_header("X-API-Key", &fixtures::site_key())
        .add_header("X-Forwarded-For", "203.0.113.250")
        .json(&fixtures::pageview("/", "sess-1"))
        .await;

    response.assert_status(StatusCode::TOO_MANY_REQUESTS);
    let body: Value = response.json();
    assert_eq!(body["limitType"], "ip");
}

#[tokio::test]
async fn test_sink_failure_returns_500() {
    let ctx = TestContext::new();
    let server = ctx.server();
    ctx.set_sink_failure(true);

    let response = server
        .post("/api/track")
        .add_header("X-API-Key", &fixtures::site_key())
        .json(&fixtures::pageview("/", "sess-1"))
        .await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json();
    assert_eq!(body["error"], "Failed to store event");

    ctx.set_sink_failure(false);
    server
        .post("/api/track")
        .add_header("X-API-Key", &fixtures::site_key())
        .json(&fixtures::pageview("/", "sess-1"))
        .await
        .assert_status(StatusCode::ACCEPTED);
    assert_eq!(ctx.captured_events().len(), 1);
}
