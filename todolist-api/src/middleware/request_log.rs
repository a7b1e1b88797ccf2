/// Request logging and HTTP metrics
///
/// Every request gets a correlation id: the caller's `x-request-id` if it
/// sent a sane one, otherwise a fresh UUID. The id is echoed on the response.
/// The route label is the matched template (`/api/v1/todo/:id`), never the
/// raw path, so metric cardinality stays bounded.

use axum::{
    extract::{MatchedPath, Request},
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use todolist_shared::logging::redact_header;
use uuid::Uuid;

use crate::metrics;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

const MAX_REQUEST_ID_LEN: usize = 128;

/// Route label for requests no route matched
pub const UNMATCHED_ROUTE: &str = "unmatched";

pub async fn log_request(mut req: Request, next: Next) -> Response {
    let started = Instant::now();

    let request_id = incoming_request_id(req.headers()).unwrap_or_else(|| Uuid::new_v4().to_string());
    let request_id_value = HeaderValue::from_str(&request_id).ok();
    if let Some(value) = &request_id_value {
        req.headers_mut().insert(REQUEST_ID_HEADER, value.clone());
    }

    let method = req.method().clone();
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| UNMATCHED_ROUTE.to_string());

    tracing::info!(request_id = %request_id, method = %method, route = %route, "HTTP request start");
    if tracing::enabled!(tracing::Level::DEBUG) {
        tracing::debug!(request_id = %request_id, headers = ?loggable_headers(req.headers()), "HTTP request headers");
    }

    let mut response = next.run(req).await;

    let elapsed = started.elapsed();
    let status = response.status();
    metrics::record_request(method.as_str(), &route, status.as_u16(), elapsed);

    let duration_ms = elapsed.as_secs_f64() * 1000.0;
    if status.is_server_error() {
        tracing::error!(request_id = %request_id, method = %method, route = %route, status_code = status.as_u16(), duration_ms, "HTTP request end");
    } else if status.is_client_error() {
        tracing::warn!(request_id = %request_id, method = %method, route = %route, status_code = status.as_u16(), duration_ms, "HTTP request end");
    } else {
        tracing::info!(request_id = %request_id, method = %method, route = %route, status_code = status.as_u16(), duration_ms, "HTTP request end");
    }

    if let Some(value) = request_id_value {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    response
}

fn incoming_request_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|id| !id.is_empty() && id.len() <= MAX_REQUEST_ID_LEN)
        .map(str::to_string)
}

/// Header pairs with credentials masked
fn loggable_headers(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            let value = value.to_str().unwrap_or("<binary>");
            (name.to_string(), redact_header(name.as_str(), value).to_string())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, routing::get, Router};
    use tower::ServiceExt;

    fn app() -> Router {
        Router::new()
            .route("/items/:id", get(|| async { "ok" }))
            .layer(axum::middleware::from_fn(log_request))
    }

    #[tokio::test]
    async fn test_generates_request_id() {
        let response = app()
            .oneshot(Request::builder().uri("/items/1").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let id = response.headers().get(REQUEST_ID_HEADER).unwrap().to_str().unwrap();
        assert!(Uuid::parse_str(id).is_ok());
    }

    #[tokio::test]
    async fn test_propagates_request_id() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/items/1")
                    .header(REQUEST_ID_HEADER, "abc-123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.headers().get(REQUEST_ID_HEADER).unwrap(), "abc-123");
    }

    #[test]
    fn test_loggable_headers_mask_credentials() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer secret"));
        headers.insert("accept", HeaderValue::from_static("application/json"));

        let logged = loggable_headers(&headers);
        assert!(logged.iter().all(|(_, v)| !v.contains("secret")));
        assert!(logged.contains(&("accept".to_string(), "application/json".to_string())));
    }
}
