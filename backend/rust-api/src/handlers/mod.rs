use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use base64::{engine::general_purpose, Engine as _};
use serde_json::json;
use std::sync::Arc;

use crate::errors::ApiError;
use crate::metrics;
use crate::services::AppState;

pub mod auth;
pub mod forms;
pub mod public;
pub mod submissions;
pub mod upload;

pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let mongo_health = check_mongodb(&state).await;
    let healthy = mongo_health.get("status").and_then(|v| v.as_str()) == Some("healthy");

    let status_code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status_code,
        Json(json!({
            "status": if healthy { "healthy" } else { "degraded" },
            "service": "formforge-api",
            "version": env!("CARGO_PKG_VERSION"),
            "imageStore": state.images.backend_name(),
            "dependencies": { "mongodb": mongo_health }
        })),
    )
}

async fn check_mongodb(state: &AppState) -> serde_json::Map<String, serde_json::Value> {
    let mut result = serde_json::Map::new();

    match tokio::time::timeout(
        std::time::Duration::from_secs(1),
        state.mongo.run_command(mongodb::bson::doc! { "ping": 1 }),
    )
    .await
    {
        Ok(Ok(_)) => {
            result.insert("status".to_string(), json!("healthy"));
        }
        Ok(Err(e)) => {
            tracing::warn!("MongoDB health check failed: {}", e);
            result.insert("status".to_string(), json!("unhealthy"));
            result.insert("error".to_string(), json!("MongoDB ping failed"));
        }
        Err(_) => {
            result.insert("status".to_string(), json!("unhealthy"));
            result.insert("error".to_string(), json!("MongoDB timeout after 1s"));
        }
    }

    result
}

pub async fn metrics_handler() -> Result<impl IntoResponse, ApiError> {
    let body = metrics::render_metrics()
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("Failed to render metrics: {}", e)))?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    ))
}

/// Protects `/metrics` with HTTP Basic credentials from `METRICS_AUTH` (`user:password`).
/// Without `METRICS_AUTH` the endpoint is closed.
pub async fn metrics_auth_middleware(
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let expected = std::env::var("METRICS_AUTH")
        .ok()
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ApiError::unauthorized("Metrics are disabled"))?;

    let credentials = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Basic "))
        .and_then(|encoded| general_purpose::STANDARD.decode(encoded.trim()).ok())
        .and_then(|decoded| String::from_utf8(decoded).ok())
        .ok_or_else(|| ApiError::unauthorized("Basic credentials required"))?;

    if credentials != expected {
        tracing::warn!("Rejected metrics scrape with wrong credentials");
        return Err(ApiError::unauthorized("Invalid credentials"));
    }

    Ok(next.run(request).await)
}
