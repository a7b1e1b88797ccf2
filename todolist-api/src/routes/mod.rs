/// API route handlers
///
/// This module contains all route handlers organized by resource:
///
/// - `health`: Liveness text and health check
/// - `auth`: Registration, login, logout and the OTP flows
/// - `users`: Account listing, profile update, account deletion
/// - `todos`: Todo CRUD, pagination, reorder, bulk delete
/// - `metrics`: Prometheus exposition

pub mod auth;
pub mod health;
pub mod metrics;
pub mod todos;
pub mod users;

use crate::error::ApiError;

/// Fallback for unmatched paths
pub async fn not_found() -> ApiError {
    ApiError::NotFound("Page not found".to_string())
}
