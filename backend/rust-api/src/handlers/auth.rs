use axum::{extract::State, http::StatusCode, response::IntoResponse, Extension, Json};
use std::sync::Arc;

use crate::{
    errors::ApiError,
    extractors::ValidJson,
    middlewares::auth::JwtClaims,
    models::user::{LoginRequest, RegisterRequest},
    services::{auth_service::AuthService, AppState},
};

fn auth_service(state: &AppState) -> AuthService {
    AuthService::new(
        state.mongo.clone(),
        state.jwt.clone(),
        state.config.jwt_ttl_seconds,
    )
}

/// POST /api/auth/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    ValidJson(req): ValidJson<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    tracing::info!("Registering new user: {}", req.email);

    let response = auth_service(&state).register(req).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    ValidJson(req): ValidJson<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let response = auth_service(&state).login(req).await?;
    Ok(Json(response))
}

/// GET /api/auth/me
pub async fn me(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<impl IntoResponse, ApiError> {
    let profile = auth_service(&state)
        .get_user_by_id(claims.user_id()?)
        .await?;
    Ok(Json(profile))
}
