/// Request extractors with JSON error bodies
///
/// axum's own `Json` rejects malformed bodies with a plain-text response.
/// [`ApiJson`] routes the rejection through [`ApiError`] instead so every
/// error the API returns has the same shape.

use axum::{
    async_trait,
    extract::{FromRequest, Request},
    Json,
};
use uuid::Uuid;

use crate::error::ApiError;

/// `Json<T>` whose rejection is an [`ApiError::BadRequest`]
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = axum::extract::rejection::JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(ApiJson(value))
    }
}

/// Parses a path id, answering 400 for anything that is not a UUID
pub fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::BadRequest("Invalid id".to_string()))
}
