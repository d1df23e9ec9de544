use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation,
};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::errors::ApiError;
use crate::services::AppState;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct JwtClaims {
    pub sub: String,   // user id (ObjectId hex)
    pub email: String,
    pub name: String,
    pub role: String,
    pub exp: usize,
    pub iat: usize,
}

impl JwtClaims {
    /// Owner id used to scope form queries.
    pub fn user_id(&self) -> Result<ObjectId, ApiError> {
        ObjectId::parse_str(&self.sub)
            .map_err(|_| ApiError::unauthorized("Token subject is not a valid user id"))
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Invalid token")]
    InvalidToken,
    #[error("Token expired")]
    ExpiredToken,
    #[error("Missing authorization token")]
    MissingToken,
    #[error("Invalid token signature")]
    InvalidSignature,
    #[error("Failed to sign token")]
    Signing,
}

#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtService {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    pub fn generate_token(&self, claims: &JwtClaims) -> Result<String, AuthError> {
        encode(&Header::default(), claims, &self.encoding_key).map_err(|_| AuthError::Signing)
    }

    pub fn validate_token(&self, token: &str) -> Result<JwtClaims, AuthError> {
        decode::<JwtClaims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
                ErrorKind::InvalidSignature => AuthError::InvalidSignature,
                _ => AuthError::InvalidToken,
            })
    }
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(AuthError::MissingToken)
}

/// Rejects requests without a valid bearer token; stores the claims in request
/// extensions for `Extension<JwtClaims>` extraction.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let claims = bearer_token(request.headers())
        .and_then(|token| state.jwt.validate_token(token))
        .map_err(|e| {
            tracing::warn!("JWT validation failed: {}", e);
            ApiError::unauthorized(e.to_string())
        })?;

    tracing::debug!("Authenticated user: {} ({})", claims.sub, claims.email);

    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}
