use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use serde_json::json;

mod common;

use common::{create_db_test_app, create_test_app, empty_request, json_request, send};

#[tokio::test]
async fn register_rejects_invalid_email() {
    let app = create_test_app().await;

    let (status, body) = send(
        &app.router,
        json_request(
            "POST",
            "/api/auth/register",
            None,
            &json!({ "email": "not-an-email", "password": "password123", "name": "Ada" }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains("Validation error"));
}

#[tokio::test]
async fn register_rejects_short_password() {
    let app = create_test_app().await;

    let (status, _) = send(
        &app.router,
        json_request(
            "POST",
            "/api/auth/register",
            None,
            &json!({ "email": "ada@example.com", "password": "short", "name": "Ada" }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn login_rejects_malformed_json() {
    let app = create_test_app().await;

    let request = Request::builder()
        .method("POST")
        .uri("/api/auth/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{ not json"))
        .unwrap();
    let (status, body) = send(&app.router, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], 400);
}

#[tokio::test]
async fn me_requires_a_token() {
    let app = create_test_app().await;

    let (status, body) = send(&app.router, empty_request("GET", "/api/auth/me", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Missing authorization token");

    let (status, _) = send(
        &app.router,
        empty_request("GET", "/api/auth/me", Some("not.a.jwt")),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn responses_carry_a_trace_id() {
    let app = create_test_app().await;

    let request = Request::builder()
        .uri("/api/auth/me")
        .header("x-trace-id", "trace-123")
        .body(Body::empty())
        .unwrap();
    let response = tower::ServiceExt::oneshot(app.router.clone(), request)
        .await
        .unwrap();

    assert_eq!(response.headers()["x-trace-id"], "trace-123");
    assert!(response
        .headers()
        .contains_key(header::CONTENT_SECURITY_POLICY));
}

#[tokio::test]
#[ignore = "requires MongoDB"]
async fn register_login_me_flow() {
    let app = create_db_test_app().await;
    let credentials = json!({
        "email": "Ada@Example.com",
        "password": "password123",
        "name": "Ada Lovelace",
    });

    let (status, body) = send(
        &app.router,
        json_request("POST", "/api/auth/register", None, &credentials),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["user"]["email"], "ada@example.com");
    assert!(body["token"].as_str().is_some());

    let (status, _) = send(
        &app.router,
        json_request("POST", "/api/auth/register", None, &credentials),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(
        &app.router,
        json_request(
            "POST",
            "/api/auth/login",
            None,
            &json!({ "email": "ada@example.com", "password": "wrong-password" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(
        &app.router,
        json_request(
            "POST",
            "/api/auth/login",
            None,
            &json!({ "email": "ADA@example.com", "password": "password123" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["token"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app.router,
        empty_request("GET", "/api/auth/me", Some(&token)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Ada Lovelace");
    assert!(body.get("passwordHash").is_none());
}
