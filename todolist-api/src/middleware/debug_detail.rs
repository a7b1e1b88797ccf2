/// Internal error detail for non-production deployments
///
/// [`ApiError::InternalError`](crate::error::ApiError::InternalError) leaves
/// its message in an [`InternalErrorDetail`] extension. Unless the app runs
/// in production this layer rewrites the 500 body with a `debug` field.

use axum::{
    body::Body,
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};

use crate::app::AppState;
use crate::error::{ErrorResponse, InternalErrorDetail};

pub async fn expose(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let mut response = next.run(req).await;

    let Some(InternalErrorDetail(detail)) = response.extensions_mut().remove::<InternalErrorDetail>() else {
        return response;
    };
    if state.config.api.production {
        return response;
    }

    let body = match serde_json::to_vec(&ErrorResponse::internal(Some(detail))) {
        Ok(body) => body,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to encode debug detail");
            return response;
        }
    };

    let (mut parts, _) = response.into_parts();
    parts.headers.remove(header::CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(body))
}
