mod common;

use axum::http::{HeaderName, HeaderValue, Method, StatusCode, header};
use common::{BANNED_ID, MEMBER_ID, TestApp, bearer, json_accept, test_config};
use serde_json::{Value, json};

fn x_api_key() -> HeaderName {
    HeaderName::from_static("x-api-key")
}

#[tokio::test]
async fn test_unknown_bearer_key_is_rejected() {
    let app = TestApp::spawn();

    let response = app
        .server
        .get("/api/me")
        .add_header(header::AUTHORIZATION, bearer("not-a-real-key"))
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.json::<Value>(),
        json!({ "error": "Invalid API key" })
    );
    assert_eq!(response.headers()[header::WWW_AUTHENTICATE], "Bearer");
}

#[tokio::test]
async fn test_valid_bearer_key_resolves_service_identity() {
    let app = TestApp::spawn();
    let key = app.api_key(MEMBER_ID).await;

    let response = app
        .server
        .get("/api/me")
        .add_header(header::AUTHORIZATION, bearer(&key))
        .await;

    response.assert_status_ok();
    let json = response.json::<Value>();
    assert_eq!(json["kind"], "service");
    assert_eq!(json["owner_id"], MEMBER_ID);
    assert!(json["summary"].as_str().unwrap().starts_with("service:"));

    assert_eq!(response.headers()["x-ratelimit-limit"], "60");
    assert_eq!(response.headers()["x-ratelimit-remaining"], "59");
}

#[tokio::test]
async fn test_key_accepted_from_header_and_query() {
    let app = TestApp::spawn();
    let key = app.api_key(MEMBER_ID).await;

    let from_header = app
        .server
        .get("/api/me")
        .add_header(x_api_key(), HeaderValue::from_str(&key).unwrap())
        .await;
    from_header.assert_status_ok();

    let from_query = app.server.get(&format!("/api/me?api_key={key}")).await;
    from_query.assert_status_ok();
    assert_eq!(from_query.json::<Value>()["kind"], "service");
}

#[tokio::test]
async fn test_key_of_banned_owner_is_forbidden() {
    let app = TestApp::spawn();
    let key = app.api_key(BANNED_ID).await;

    let response = app
        .server
        .get("/api/me")
        .add_header(header::AUTHORIZATION, bearer(&key))
        .await;

    response.assert_status(StatusCode::FORBIDDEN);
    assert_eq!(
        response.json::<Value>(),
        json!({ "error": "Account is blocked" })
    );
}

#[tokio::test]
async fn test_anonymous_caller_needs_credentials_for_me() {
    let app = TestApp::spawn();

    let response = app.server.get("/api/me").await;

    response.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.json::<Value>(),
        json!({ "error": "Authentication required" })
    );
}

#[tokio::test]
async fn test_preflight_answers_before_authentication() {
    let app = TestApp::spawn();

    let response = app
        .server
        .method(Method::OPTIONS, "/api/me")
        .add_header(
            header::ORIGIN,
            HeaderValue::from_static("https://forum.example"),
        )
        .add_header(header::AUTHORIZATION, bearer("not-a-real-key"))
        .await;

    response.assert_status_ok();
    assert!(response.text().is_empty());

    let headers = response.headers();
    assert_eq!(
        headers[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "https://forum.example"
    );
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
    assert!(headers.contains_key(header::ACCESS_CONTROL_ALLOW_METHODS));
    assert_eq!(headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
}

#[tokio::test]
async fn test_disallowed_origin_is_not_echoed() {
    let mut config = test_config();
    config.security.allowed_origins = vec!["https://forum.example".to_string()];
    let app = TestApp::spawn_with(config);

    let response = app
        .server
        .method(Method::OPTIONS, "/api/me")
        .add_header(
            header::ORIGIN,
            HeaderValue::from_static("https://evil.example"),
        )
        .await;

    response.assert_status_ok();
    assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    assert!(
        !response
            .headers()
            .contains_key(header::ACCESS_CONTROL_ALLOW_CREDENTIALS)
    );
}

#[tokio::test]
async fn test_rate_limit_rejects_after_quota() {
    let mut config = test_config();
    config.rate_limit.max_requests = 3;
    config.rate_limit.window_seconds = 60;
    let app = TestApp::spawn_with(config);
    let key = app.api_key(MEMBER_ID).await;

    for remaining in ["2", "1", "0"] {
        let response = app
            .server
            .get("/api/me")
            .add_header(header::AUTHORIZATION, bearer(&key))
            .await;
        response.assert_status_ok();
        assert_eq!(response.headers()["x-ratelimit-remaining"], remaining);
    }

    let response = app
        .server
        .get("/api/me")
        .add_header(header::AUTHORIZATION, bearer(&key))
        .await;

    response.assert_status(StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers()[header::RETRY_AFTER], "60");
    assert_eq!(response.headers()["x-ratelimit-remaining"], "0");
    assert_eq!(
        response.json::<Value>(),
        json!({ "error": "Too many requests" })
    );
    assert_eq!(response.headers()[header::X_FRAME_OPTIONS], "DENY");
}

#[tokio::test]
async fn test_disabled_rate_limit_sets_no_headers() {
    let mut config = test_config();
    config.rate_limit.enabled = false;
    let app = TestApp::spawn_with(config);

    let response = app.server.get("/api/me").await;

    assert!(!response.headers().contains_key("x-ratelimit-limit"));
}

#[tokio::test]
async fn test_service_key_is_exempt_from_csrf() {
    let app = TestApp::spawn();
    let key = app.api_key(MEMBER_ID).await;

    let response = app
        .server
        .post("/threads")
        .add_header(header::AUTHORIZATION, bearer(&key))
        .json(&json!({ "title": "Release notes" }))
        .await;

    response.assert_status(StatusCode::CREATED);
}

#[tokio::test]
async fn test_unknown_route_still_runs_through_pipeline() {
    let app = TestApp::spawn();

    let response = app
        .server
        .get("/api/nothing-here")
        .add_header(header::AUTHORIZATION, bearer("not-a-real-key"))
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_every_outcome_is_audited() {
    let mut app = TestApp::spawn();
    let key = app.api_key(MEMBER_ID).await;

    app.server
        .get("/api/me")
        .add_header(header::AUTHORIZATION, bearer("not-a-real-key"))
        .await;
    app.server
        .get("/api/me")
        .add_header(header::AUTHORIZATION, bearer(&key))
        .add_header(header::ACCEPT, json_accept())
        .await;

    let rejected = app.audit_rx.recv().await.unwrap();
    assert_eq!(rejected.status_code, 401);
    assert_eq!(rejected.path, "/api/me");
    assert_eq!(rejected.identity.as_deref(), Some("anonymous"));

    let accepted = app.audit_rx.recv().await.unwrap();
    assert_eq!(accepted.status_code, 200);
    assert!(accepted.identity.unwrap().starts_with("service:"));
}
