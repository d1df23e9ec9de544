use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use std::sync::Arc;

use crate::{
    errors::{parse_object_id, ApiError},
    middlewares::auth::JwtClaims,
    models::submission::SubmissionResponse,
    services::{submission_service::SubmissionService, AppState},
};

/// GET /api/forms/{id}/submissions
pub async fn list_submissions(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let form_id = parse_object_id(&id, "form id")?;
    let submissions = SubmissionService::new(state.mongo.clone())
        .list_for_form(claims.user_id()?, form_id)
        .await?;

    let body: Vec<SubmissionResponse> = submissions
        .into_iter()
        .map(SubmissionResponse::from)
        .collect();
    Ok(Json(body))
}

/// GET /api/forms/{id}/submissions/{submission_id}
pub async fn get_submission(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path((id, submission_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let form_id = parse_object_id(&id, "form id")?;
    let submission_id = parse_object_id(&submission_id, "submission id")?;

    let submission = SubmissionService::new(state.mongo.clone())
        .get_submission(claims.user_id()?, form_id, submission_id)
        .await?;

    Ok(Json(SubmissionResponse::from(submission)))
}

/// DELETE /api/forms/{id}/submissions/{submission_id}
pub async fn delete_submission(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path((id, submission_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let form_id = parse_object_id(&id, "form id")?;
    let submission_id = parse_object_id(&submission_id, "submission id")?;

    SubmissionService::new(state.mongo.clone())
        .delete_submission(claims.user_id()?, form_id, submission_id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
