mod common;

use axum::http::{StatusCode, header};
use common::TestApp;

#[tokio::test]
async fn test_health_endpoint_success() {
    let app = TestApp::spawn();

    let response = app.server.get("/health").await;

    response.assert_status_ok();

    let json = response.json::<serde_json::Value>();
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["checks"]["credential_store"]["status"], "ok");
    assert_eq!(json["checks"]["rate_limit_store"]["status"], "ok");
    assert_eq!(json["checks"]["audit_queue"]["status"], "ok");
}

#[tokio::test]
async fn test_health_probe_bypasses_pipeline() {
    let app = TestApp::spawn();

    let response = app.server.get("/health").await;

    assert!(!response.headers().contains_key(header::SET_COOKIE));
    assert_eq!(app.credentials.session_count(), 0);
}

#[tokio::test]
async fn test_health_degraded_when_audit_queue_closed() {
    let TestApp {
        server, audit_rx, ..
    } = TestApp::spawn();
    drop(audit_rx);

    let response = server.get("/health").await;

    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    let json = response.json::<serde_json::Value>();
    assert_eq!(json["status"], "degraded");
    assert_eq!(json["checks"]["audit_queue"]["status"], "error");
}

#[tokio::test]
async fn test_health_endpoint_structure() {
    let app = TestApp::spawn();

    let response = app.server.get("/health").await;

    let json = response.json::<serde_json::Value>();

    assert!(json.get("status").is_some());
    assert!(json.get("version").is_some());
    assert!(json.get("checks").is_some());
    assert!(json["checks"].get("credential_store").is_some());
    assert!(json["checks"].get("rate_limit_store").is_some());
    assert!(json["checks"].get("audit_queue").is_some());
}
