#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use formforge_api::{
    config::{Config, UploadBackend, UploadSettings},
    create_router,
    middlewares::auth::JwtClaims,
    services::AppState,
};
use mongodb::bson::oid::ObjectId;
use serde_json::Value;
use std::{path::PathBuf, sync::Arc};
use tower::ServiceExt;
use uuid::Uuid;

pub const TEST_SECRET: &str = "integration-test-secret";

/// Nothing listens on port 1, so DB-free tests fail fast if they ever reach Mongo.
pub const UNREACHABLE_MONGO_URI: &str = "mongodb://127.0.0.1:1/?serverSelectionTimeoutMS=500";

pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub upload_dir: PathBuf,
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.upload_dir);
    }
}

/// App wired to a MongoDB that is not there. Enough for auth, validation and
/// upload paths, which never touch the database.
pub async fn create_test_app() -> TestApp {
    build_app(UNREACHABLE_MONGO_URI, 1024 * 1024).await
}

/// App against a live MongoDB (`MONGO_TEST_URI`, default localhost) using a
/// throwaway database.
pub async fn create_db_test_app() -> TestApp {
    let uri = std::env::var("MONGO_TEST_URI").unwrap_or_else(|_| {
        "mongodb://127.0.0.1:27017/?serverSelectionTimeoutMS=2000".to_string()
    });
    let app = build_app(&uri, 1024 * 1024).await;
    app.state
        .ensure_indexes()
        .await
        .expect("Failed to create indexes in test MongoDB");
    app
}

pub async fn create_test_app_with_upload_limit(max_bytes: usize) -> TestApp {
    build_app(UNREACHABLE_MONGO_URI, max_bytes).await
}

async fn build_app(mongo_uri: &str, max_bytes: usize) -> TestApp {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();

    let upload_dir = std::env::temp_dir().join(format!("formforge-test-{}", Uuid::new_v4()));

    let config = Config {
        mongo_uri: mongo_uri.to_string(),
        mongo_database: format!("formforge_test_{}", Uuid::new_v4().simple()),
        jwt_secret: TEST_SECRET.to_string(),
        jwt_ttl_seconds: 3600,
        bind_addr: "127.0.0.1:0".to_string(),
        cors_origin: None,
        upload: UploadSettings {
            backend: UploadBackend::Local,
            dir: upload_dir.to_string_lossy().into_owned(),
            public_path: "/uploads".to_string(),
            max_bytes,
        },
        object_storage: None,
    };

    let mongo_client = mongodb::Client::with_uri_str(&config.mongo_uri)
        .await
        .expect("Failed to create MongoDB client");

    let state = Arc::new(
        AppState::new(config, mongo_client)
            .await
            .expect("Failed to initialize test app state"),
    );

    TestApp {
        router: create_router(state.clone()),
        state,
        upload_dir,
    }
}

/// Signs a token for a user that need not exist in the database.
pub fn token_for(state: &AppState, user_id: ObjectId) -> String {
    let now = chrono::Utc::now().timestamp() as usize;
    state
        .jwt
        .generate_token(&JwtClaims {
            sub: user_id.to_hex(),
            email: "owner@example.com".to_string(),
            name: "Owner".to_string(),
            role: "user".to_string(),
            exp: now + 3600,
            iat: now,
        })
        .expect("Failed to sign test token")
}

pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap_or_else(|_| {
            Value::String(String::from_utf8_lossy(&body).into_owned())
        })
    };
    (status, json)
}

pub fn json_request(method: &str, uri: &str, token: Option<&str>, body: &Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn empty_request(method: &str, uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

pub const BOUNDARY: &str = "formforge-test-boundary";

/// Single-part multipart body.
pub fn multipart_body(field: &str, filename: &str, content_type: &str, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
            field, filename
        )
        .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}

pub fn multipart_request(token: Option<&str>, body: Vec<u8>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/upload/image")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        );
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body)).unwrap()
}
