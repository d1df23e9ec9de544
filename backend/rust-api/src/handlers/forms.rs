use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use std::sync::Arc;

use crate::{
    errors::{parse_object_id, ApiError},
    extractors::{AppJson, ValidJson},
    middlewares::auth::JwtClaims,
    models::form::{FormPayload, FormResponse, PublishRequest},
    services::{form_service::FormService, AppState},
};

/// GET /api/forms
pub async fn list_forms(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<impl IntoResponse, ApiError> {
    let forms = FormService::new(state.mongo.clone())
        .list_forms(claims.user_id()?)
        .await?;

    let body: Vec<FormResponse> = forms.into_iter().map(FormResponse::from).collect();
    Ok(Json(body))
}

/// POST /api/forms
pub async fn create_form(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    ValidJson(payload): ValidJson<FormPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let form = FormService::new(state.mongo.clone())
        .create_form(claims.user_id()?, payload)
        .await?;

    Ok((StatusCode::CREATED, Json(FormResponse::from(form))))
}

/// GET /api/forms/{id}
pub async fn get_form(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let form_id = parse_object_id(&id, "form id")?;
    let form = FormService::new(state.mongo.clone())
        .get_owned_form(claims.user_id()?, form_id)
        .await?;

    Ok(Json(FormResponse::from(form)))
}

/// PUT /api/forms/{id}
pub async fn update_form(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(id): Path<String>,
    ValidJson(payload): ValidJson<FormPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let form_id = parse_object_id(&id, "form id")?;
    let form = FormService::new(state.mongo.clone())
        .update_form(claims.user_id()?, form_id, payload)
        .await?;

    Ok(Json(FormResponse::from(form)))
}

/// PATCH /api/forms/{id}/publish
pub async fn set_published(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(id): Path<String>,
    AppJson(req): AppJson<PublishRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let form_id = parse_object_id(&id, "form id")?;
    let form = FormService::new(state.mongo.clone())
        .set_published(claims.user_id()?, form_id, req.is_published)
        .await?;

    Ok(Json(FormResponse::from(form)))
}

/// DELETE /api/forms/{id}
pub async fn delete_form(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let form_id = parse_object_id(&id, "form id")?;
    FormService::new(state.mongo.clone())
        .delete_form(claims.user_id()?, form_id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
