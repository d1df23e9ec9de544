use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use crate::{
    errors::ApiError,
    extractors::ValidJson,
    models::{form::PublicFormResponse, submission::SubmitFormRequest},
    services::{
        form_service::FormService,
        submission_service::{ClientInfo, SubmissionService},
        AppState,
    },
};

/// GET /api/public/forms/{public_id}
pub async fn get_public_form(
    State(state): State<Arc<AppState>>,
    Path(public_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let form = FormService::new(state.mongo.clone())
        .get_published_form(&public_id)
        .await?;

    Ok(Json(PublicFormResponse::from(&form)))
}

/// POST /api/public/forms/{public_id}/submit
pub async fn submit_form(
    State(state): State<Arc<AppState>>,
    Path(public_id): Path<String>,
    headers: HeaderMap,
    ValidJson(req): ValidJson<SubmitFormRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let response = SubmissionService::new(state.mongo.clone())
        .submit(&public_id, req, client_info(&headers))
        .await?;

    Ok((StatusCode::CREATED, Json(response)))
}

/// Respondent address as reported by the proxy in front of the API.
fn client_info(headers: &HeaderMap) -> ClientInfo {
    let header_str = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    let ip_address = header_str("x-forwarded-for")
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .or_else(|| header_str("x-real-ip"))
        .map(str::to_string);

    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.chars().take(512).collect());

    ClientInfo {
        ip_address,
        user_agent,
    }
}
