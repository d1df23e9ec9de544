use axum::http::{header, StatusCode};
use mongodb::bson::oid::ObjectId;
use tower::ServiceExt;

mod common;

use common::{
    create_test_app, create_test_app_with_upload_limit, empty_request, multipart_body,
    multipart_request, send, token_for,
};

const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\nnot-really-a-png";

#[tokio::test]
async fn upload_requires_authentication() {
    let app = create_test_app().await;
    let body = multipart_body("image", "a.png", "image/png", PNG_BYTES);

    let (status, _) = send(&app.router, multipart_request(None, body)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn missing_image_field_is_rejected() {
    let app = create_test_app().await;
    let token = token_for(&app.state, ObjectId::new());
    let body = multipart_body("file", "a.png", "image/png", PNG_BYTES);

    let (status, body) = send(&app.router, multipart_request(Some(&token), body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "No image file provided");
}

#[tokio::test]
async fn non_images_are_rejected() {
    let app = create_test_app().await;
    let token = token_for(&app.state, ObjectId::new());
    let body = multipart_body("image", "notes.txt", "text/plain", b"hello");

    let (status, body) = send(&app.router, multipart_request(Some(&token), body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Only image files are allowed");
}

#[tokio::test]
async fn svg_images_are_rejected() {
    let app = create_test_app().await;
    let token = token_for(&app.state, ObjectId::new());
    let svg = b"<svg xmlns=\"http://www.w3.org/2000/svg\"><script>alert(1)</script></svg>";
    let body = multipart_body("image", "logo.svg", "image/svg+xml", svg);

    let (status, body) = send(&app.router, multipart_request(Some(&token), body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Unsupported image type: image/svg+xml");
    assert_eq!(std::fs::read_dir(&app.upload_dir).unwrap().count(), 0);
}

#[tokio::test]
async fn svg_name_on_a_png_upload_is_stored_as_png() {
    let app = create_test_app().await;
    let token = token_for(&app.state, ObjectId::new());
    let body = multipart_body("image", "logo.svg", "image/png", PNG_BYTES);

    let (status, uploaded) = send(&app.router, multipart_request(Some(&token), body)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(uploaded["filename"].as_str().unwrap().ends_with(".png"));
}

#[tokio::test]
async fn oversized_images_are_rejected() {
    let app = create_test_app_with_upload_limit(16).await;
    let token = token_for(&app.state, ObjectId::new());
    let body = multipart_body("image", "big.png", "image/png", &[0u8; 64]);

    let (status, _) = send(&app.router, multipart_request(Some(&token), body)).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn upload_serve_and_delete_roundtrip() {
    let app = create_test_app().await;
    let token = token_for(&app.state, ObjectId::new());
    let body = multipart_body("image", "Header.PNG", "image/png", PNG_BYTES);

    let (status, uploaded) = send(&app.router, multipart_request(Some(&token), body)).await;
    assert_eq!(status, StatusCode::CREATED);

    let filename = uploaded["filename"].as_str().unwrap().to_string();
    let image_url = uploaded["imageUrl"].as_str().unwrap().to_string();
    assert!(filename.ends_with(".png"));
    assert_eq!(image_url, format!("/uploads/{}", filename));
    assert_eq!(
        std::fs::read(app.upload_dir.join(&filename)).unwrap(),
        PNG_BYTES
    );

    // Served back without auth by the static file service
    let response = app
        .router
        .clone()
        .oneshot(empty_request("GET", &image_url, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
    assert_eq!(response.headers()[header::X_CONTENT_TYPE_OPTIONS], "nosniff");

    let delete_uri = format!("/api/upload/image/{}", filename);
    let (status, _) = send(
        &app.router,
        empty_request("DELETE", &delete_uri, Some(&token)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(!app.upload_dir.join(&filename).exists());

    let (status, _) = send(
        &app.router,
        empty_request("DELETE", &delete_uri, Some(&token)),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_rejects_path_tricks() {
    let app = create_test_app().await;
    let token = token_for(&app.state, ObjectId::new());

    let (status, _) = send(
        &app.router,
        empty_request("DELETE", "/api/upload/image/..%2Fsecret.png", Some(&token)),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
