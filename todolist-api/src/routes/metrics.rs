/// Prometheus exposition endpoint
///
/// Served at both `GET /metrics` and `GET /api/metrics`. Public, like the
/// scrape targets it replaces.

use axum::{extract::State, http::header, response::IntoResponse};

use crate::app::AppState;

/// Content type of the text exposition format
pub const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

pub async fn render(State(state): State<AppState>) -> impl IntoResponse {
    ([(header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)], state.metrics.render())
}
