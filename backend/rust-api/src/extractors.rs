use axum::{
    extract::{FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::errors::ApiError;

/// JSON body extractor whose rejections are `ApiError`s, so malformed bodies
/// get the same `{message, status}` shape as every other client error.
pub struct AppJson<T>(pub T);

impl<T, S> FromRequest<S> for AppJson<T>
where
    T: DeserializeOwned + 'static,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await.map_err(|rejection| {
            let message = format!("Failed to parse JSON request body: {}", rejection.body_text());
            tracing::warn!("{}", message);
            ApiError::BadRequest(message)
        })?;
        Ok(AppJson(value))
    }
}

/// `AppJson` plus `validator` checks on the decoded value.
pub struct ValidJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidJson<T>
where
    T: DeserializeOwned + Validate + 'static,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let AppJson(value) = AppJson::<T>::from_request(req, state).await?;
        value.validate().map_err(|errors| {
            tracing::warn!("Request validation failed: {}", errors);
            ApiError::BadRequest(format!("Validation error: {}", errors))
        })?;
        Ok(ValidJson(value))
    }
}
