use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;

use crate::metrics::{HTTP_REQUESTS_TOTAL, HTTP_REQUEST_DURATION_SECONDS};

/// Route segments that are part of the API surface; anything else in a path is
/// an identifier (ObjectId, public id, upload filename) and gets collapsed.
const STATIC_SEGMENTS: &[&str] = &[
    "api",
    "auth",
    "register",
    "login",
    "me",
    "forms",
    "publish",
    "submissions",
    "public",
    "submit",
    "upload",
    "image",
    "uploads",
    "health",
    "metrics",
];

/// Records request count and latency per method, route shape and status.
pub async fn metrics_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();
    let path = normalize_path(req.uri().path());

    let response = next.run(req).await;

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    HTTP_REQUESTS_TOTAL
        .with_label_values(&[&method, &path, &status])
        .inc();
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[&method, &path])
        .observe(duration);

    response
}

/// Collapses identifier segments into `{id}` so label cardinality stays bounded.
fn normalize_path(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            if segment.is_empty() || STATIC_SEGMENTS.contains(&segment) {
                segment
            } else {
                "{id}"
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}
