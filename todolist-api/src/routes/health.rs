/// Liveness and health endpoints
///
/// # Endpoints
///
/// ```text
/// GET /         -> "Todo backend running"
/// GET /health   -> JSON status
/// ```
///
/// # Response
///
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0",
///   "storage": "postgres",
///   "database": "connected",
///   "cache": "redis"
/// }
/// ```
///
/// A failed store ping reports `"degraded"` with status 200; the endpoint
/// itself never fails.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::app::AppState;

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,

    pub version: String,

    /// Store backend name
    pub storage: String,

    pub database: String,

    /// Cache backend name
    pub cache: String,
}

pub async fn root() -> &'static str {
    "Todo backend running"
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = match state.store.ping().await {
        Ok(()) => "connected",
        Err(e) => {
            tracing::warn!(error = %e, "Health check: store unreachable");
            "disconnected"
        }
    };

    Json(HealthResponse {
        status: if database == "connected" { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        storage: state.store.backend().to_string(),
        database: database.to_string(),
        cache: state.cache.backend_name().to_string(),
    })
}
