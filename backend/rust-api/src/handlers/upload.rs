use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        Multipart, Path, State,
    },
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;
use std::sync::Arc;

use crate::{
    errors::ApiError,
    metrics::record_image_operation,
    services::{
        image_store::{generate_filename, raster_extension, validate_filename},
        AppState,
    },
};

const IMAGE_FIELD: &str = "image";

/// POST /api/upload/image
pub async fn upload_image(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let mut multipart = multipart.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let max_bytes = state.config.upload.max_bytes;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, max_bytes))?
    {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }

        let content_type = field
            .content_type()
            .map(str::to_string)
            .unwrap_or_default();
        if !content_type.starts_with("image/") {
            return Err(ApiError::bad_request("Only image files are allowed"));
        }
        if raster_extension(&content_type).is_none() {
            return Err(ApiError::bad_request(format!(
                "Unsupported image type: {}",
                content_type
            )));
        }

        let filename = generate_filename(field.file_name(), &content_type);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| multipart_error(e, max_bytes))?;

        if bytes.len() > max_bytes {
            return Err(ApiError::PayloadTooLarge(max_bytes));
        }
        if bytes.is_empty() {
            return Err(ApiError::bad_request("Uploaded file is empty"));
        }

        let size = bytes.len();
        let image_url = state
            .images
            .put(&filename, bytes.to_vec(), &content_type)
            .await?;

        record_image_operation("upload", state.images.backend_name());
        tracing::info!(filename = %filename, size, "Image uploaded");

        return Ok((
            StatusCode::CREATED,
            Json(json!({
                "message": "Image uploaded successfully",
                "imageUrl": image_url,
                "filename": filename,
            })),
        ));
    }

    Err(ApiError::bad_request("No image file provided"))
}

/// DELETE /api/upload/image/{filename}
pub async fn delete_image(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    validate_filename(&filename).map_err(ApiError::BadRequest)?;

    if !state.images.delete(&filename).await? {
        return Err(ApiError::not_found("Image not found"));
    }

    record_image_operation("delete", state.images.backend_name());
    tracing::info!(filename = %filename, "Image deleted");

    Ok(Json(json!({ "message": "Image deleted successfully" })))
}

fn multipart_error(err: MultipartError, max_bytes: usize) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(max_bytes)
    } else {
        ApiError::bad_request(err.body_text())
    }
}
