use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use timesync_auth::config::Settings;
use timesync_auth::router::build_router;
use timesync_auth::state::AppState;

use crate::helpers::{MemStore, MockMailer, test_settings};

fn app(store: &MemStore, mailer: &MockMailer, settings: Settings) -> Router {
    build_router(AppState::new(
        store.clone(),
        Arc::new(mailer.clone()),
        settings,
    ))
}

async fn post(
    app: &Router,
    uri: &str,
    body: Value,
    device: Option<&str>,
) -> axum::response::Response {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(device) = device {
        builder = builder.header("x-device-id", device);
    }
    let request = builder.body(Body::from(body.to_string())).unwrap();
    app.clone().oneshot(request).await.unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_returns_ok_text() {
    let app = app(&MemStore::new(), &MockMailer::new(), test_settings());

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"ok");
}

#[tokio::test]
async fn request_code_returns_204_and_delivers() {
    let mailer = MockMailer::new();
    let app = app(&MemStore::new(), &mailer, test_settings());

    let response = post(
        &app,
        "/auth/request-code",
        json!({ "email": "user@example.com" }),
        None,
    )
    .await;

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(mailer.sent().len(), 1);
}

#[tokio::test]
async fn malformed_json_returns_400() {
    let app = app(&MemStore::new(), &MockMailer::new(), test_settings());

    let request = Request::builder()
        .method("POST")
        .uri("/auth/request-code")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "invalid request body");
}

#[tokio::test]
async fn verify_without_device_header_returns_400() {
    let app = app(&MemStore::new(), &MockMailer::new(), test_settings());

    let response = post(
        &app,
        "/auth/verify-code",
        json!({ "email": "user@example.com", "code": "ABCDEFGH" }),
        None,
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await["error"],
        "X-Device-Id header is required"
    );
}

#[tokio::test]
async fn verify_with_wrong_code_returns_401() {
    let app = app(&MemStore::new(), &MockMailer::new(), test_settings());

    let response = post(
        &app,
        "/auth/verify-code",
        json!({ "email": "user@example.com", "code": "ABCDEFGH" }),
        Some("dev-1"),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"], "invalid code");
}

#[tokio::test]
async fn full_flow_over_http() {
    let mailer = MockMailer::new();
    let app = app(&MemStore::new(), &mailer, test_settings());

    // Request a code.
    let response = post(
        &app,
        "/auth/request-code",
        json!({ "email": "user@example.com" }),
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let code = mailer.last_code().unwrap();

    // Verify it: full auth body including user, team and role.
    let response = post(
        &app,
        "/auth/verify-code",
        json!({ "email": "user@example.com", "code": code }),
        Some("dev-1"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert!(body["access_token"].is_string());
    assert!(body["access_expires_at"].is_string());
    assert_eq!(body["user"]["email"], "user@example.com");
    assert_eq!(body["team"]["domain"], "example.com");
    assert_eq!(body["role"], "admin");
    let refresh_token = body["refresh_token"].as_str().unwrap().to_owned();

    // Refresh: token body only, no user/team/role keys.
    let response = post(
        &app,
        "/auth/refresh",
        json!({ "refresh_token": refresh_token }),
        Some("dev-1"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert!(body["access_token"].is_string());
    assert!(body.get("user").is_none());
    assert!(body.get("team").is_none());
    assert!(body.get("role").is_none());
    let rotated_token = body["refresh_token"].as_str().unwrap().to_owned();

    // Logout with the newest pair.
    let response = post(
        &app,
        "/auth/logout",
        json!({ "refresh_token": rotated_token }),
        Some("dev-1"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    // The revoked token no longer refreshes.
    let response = post(
        &app,
        "/auth/refresh",
        json!({ "refresh_token": rotated_token }),
        Some("dev-1"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn team_full_returns_409() {
    let mailer = MockMailer::new();
    let mut settings = test_settings();
    settings.team_size_limit = 0;
    let app = app(&MemStore::new(), &mailer, settings);

    post(
        &app,
        "/auth/request-code",
        json!({ "email": "user@example.com" }),
        None,
    )
    .await;
    let code = mailer.last_code().unwrap();

    let response = post(
        &app,
        "/auth/verify-code",
        json!({ "email": "user@example.com", "code": code }),
        Some("dev-1"),
    )
    .await;

    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["error"], "team is full");
}

#[tokio::test]
async fn lockout_returns_429() {
    let mut settings = test_settings();
    settings.verify_code_email_limit = 1;
    let app = app(&MemStore::new(), &MockMailer::new(), settings);

    let response = post(
        &app,
        "/auth/verify-code",
        json!({ "email": "user@example.com", "code": "ABCDEFGH" }),
        Some("dev-1"),
    )
    .await;

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn request_code_ip_limit_returns_429() {
    let mailer = MockMailer::new();
    let mut settings = test_settings();
    settings.request_code_ip_limit = 2;
    let app = app(&MemStore::new(), &mailer, settings);

    for (email, expected) in [
        ("a@example.com", StatusCode::NO_CONTENT),
        ("b@example.com", StatusCode::NO_CONTENT),
        ("c@example.com", StatusCode::TOO_MANY_REQUESTS),
    ] {
        let request = Request::builder()
            .method("POST")
            .uri("/auth/request-code")
            .header("content-type", "application/json")
            .header("x-forwarded-for", "10.0.0.1")
            .body(Body::from(json!({ "email": email }).to_string()))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), expected, "email {email}");
    }
}

#[tokio::test]
async fn refresh_device_limit_returns_429() {
    let mut settings = test_settings();
    settings.refresh_device_limit = 1;
    let app = app(&MemStore::new(), &MockMailer::new(), settings);

    // First request consumes the device budget (the 401 comes from the
    // handler); the second is cut off at the edge.
    let response = post(
        &app,
        "/auth/refresh",
        json!({ "refresh_token": "whatever" }),
        Some("dev-1"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = post(
        &app,
        "/auth/refresh",
        json!({ "refresh_token": "whatever" }),
        Some("dev-1"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
}
