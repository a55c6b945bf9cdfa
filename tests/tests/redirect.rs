//! Post-login redirect allow-list.

use axum::http::StatusCode;
use integration_tests::setup::TestContext;
use serde_json::Value;

#[tokio::test]
async fn test_allowed_target_redirects() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let response = server
        .get("/auth/redirect")
        .add_query_param("next", "/settings")
        .await;

    response.assert_status(StatusCode::SEE_OTHER);
    assert_eq!(response.header("Location"), "/settings");
}

#[tokio::test]
async fn test_unknown_or_missing_target_uses_default() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let response = server
        .get("/auth/redirect")
        .add_query_param("next", "/admin/secret")
        .await;
    response.assert_status(StatusCode::SEE_OTHER);
    assert_eq!(response.header("Location"), "/");

    let response = server.get("/auth/redirect").await;
    response.assert_status(StatusCode::SEE_OTHER);
    assert_eq!(response.header("Location"), "/");
}

#[tokio::test]
async fn test_absolute_and_protocol_relative_targets_are_rejected() {
    let ctx = TestContext::new();
    let server = ctx.server();

    for target in ["https://evil.example/login", "//evil.example", "/\\evil.example"] {
        let response = server
            .get("/auth/redirect")
            .add_query_param("next", target)
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert!(body["error"].is_string(), "target {}", target);
    }
}
