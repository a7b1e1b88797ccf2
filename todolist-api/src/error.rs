/// Error handling for the API server
///
/// This module provides a unified error type that maps to HTTP responses.
/// All handlers return `Result<T, ApiError>`, which converts to the JSON body
///
/// ```json
/// { "error": "not_found", "message": "Todo not found" }
/// ```
///
/// plus `details` for validation failures and `userRole`/`requiredRoles` for
/// role mismatches. A 500 carries its detail as an [`InternalErrorDetail`]
/// response extension; outside production
/// [`crate::middleware::debug_detail`] copies it into a `debug` field.
///
/// # Example
///
/// ```
/// use todolist_api::error::{ApiError, ApiResult};
/// use axum::Json;
/// use serde_json::{json, Value};
///
/// async fn handler(found: bool) -> ApiResult<Json<Value>> {
///     if !found {
///         return Err(ApiError::NotFound("Todo not found".to_string()));
///     }
///     Ok(Json(json!({ "ok": true })))
/// }
/// ```

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;

use todolist_shared::auth::authorization::AuthzError;
use todolist_shared::auth::jwt::JwtError;
use todolist_shared::auth::middleware::AuthError;
use todolist_shared::auth::otp::OtpError;
use todolist_shared::auth::password::PasswordError;
use todolist_shared::models::UserRole;
use todolist_shared::store::StoreError;

/// API result type alias
pub type ApiResult<T> = Result<T, ApiError>;

/// What went wrong behind a 500, never serialized by itself
#[derive(Debug, Clone)]
pub struct InternalErrorDetail(pub String);

/// Unified API error type
#[derive(Debug)]
pub enum ApiError {
    /// Bad request (400)
    BadRequest(String),

    /// Unauthorized (401)
    Unauthorized(String),

    /// Forbidden (403); role mismatches carry both roles
    Forbidden {
        message: String,
        user_role: Option<UserRole>,
        required_roles: Option<Vec<UserRole>>,
    },

    /// Not found (404)
    NotFound(String),

    /// Uniqueness violation; answered with 400
    Conflict(String),

    /// Field-level validation failure (400)
    ValidationError(Vec<ValidationErrorDetail>),

    /// Internal server error (500); the message is never sent in production
    InternalError(String),
}

impl ApiError {
    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden {
            message: message.into(),
            user_role: None,
            required_roles: None,
        }
    }

    pub fn internal(err: impl fmt::Display) -> Self {
        ApiError::InternalError(err.to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::Conflict(_) | ApiError::ValidationError(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden { .. } => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Validation error detail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationErrorDetail {
    /// Field that failed validation
    pub field: String,

    /// Error message
    pub message: String,
}

impl ValidationErrorDetail {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Error response format
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    /// Error code (e.g., "bad_request", "unauthorized")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<ValidationErrorDetail>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_role: Option<UserRole>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_roles: Option<Vec<UserRole>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<String>,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::Forbidden { message, .. } => write!(f, "Forbidden: {}", message),
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::ValidationError(errors) => {
                write!(f, "Validation failed: {} errors", errors.len())
            }
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let mut detail = None;

        let body = match self {
            ApiError::BadRequest(message) => ErrorResponse::new("bad_request", message),
            ApiError::Unauthorized(message) => ErrorResponse::new("unauthorized", message),
            ApiError::Forbidden {
                message,
                user_role,
                required_roles,
            } => ErrorResponse {
                user_role,
                required_roles,
                ..ErrorResponse::new("forbidden", message)
            },
            ApiError::NotFound(message) => ErrorResponse::new("not_found", message),
            ApiError::Conflict(message) => ErrorResponse::new("conflict", message),
            ApiError::ValidationError(errors) => {
                // The first failure doubles as the headline message.
                let message = errors
                    .first()
                    .map(|detail| detail.message.clone())
                    .unwrap_or_else(|| "Request validation failed".to_string());
                ErrorResponse {
                    details: Some(errors),
                    ..ErrorResponse::new("validation_error", message)
                }
            }
            ApiError::InternalError(message) => {
                tracing::error!(error = %message, "Internal error");
                detail = Some(InternalErrorDetail(message));
                ErrorResponse::internal(None)
            }
        };

        let mut response = (status, Json(body)).into_response();
        if let Some(detail) = detail {
            response.extensions_mut().insert(detail);
        }
        response
    }
}

impl ErrorResponse {
    /// Body of every 500
    pub fn internal(debug: Option<String>) -> Self {
        Self {
            debug,
            ..Self::new("internal_error", "Internal server error")
        }
    }

    fn new(error: &str, message: impl Into<String>) -> Self {
        Self {
            error: error.to_string(),
            message: message.into(),
            details: None,
            user_role: None,
            required_roles: None,
            debug: None,
        }
    }
}

/// Collects `validator` failures into field-level details
impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        let mut errors: Vec<ValidationErrorDetail> = err
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |error| ValidationErrorDetail {
                    field: field.to_string(),
                    message: error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("{} is invalid", field)),
                })
            })
            .collect();
        errors.sort_by(|a, b| a.field.cmp(&b.field));
        ApiError::ValidationError(errors)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateEmail | StoreError::DuplicateTitle | StoreError::OrderConflict => {
                ApiError::Conflict(err.to_string())
            }
            StoreError::Database(_) | StoreError::Unavailable(_) => ApiError::internal(err),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingCredentials | AuthError::InvalidClaims => {
                ApiError::Unauthorized(err.to_string())
            }
            AuthError::InvalidToken => ApiError::forbidden(err.to_string()),
        }
    }
}

impl From<AuthzError> for ApiError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::Unauthenticated => ApiError::Unauthorized(err.to_string()),
            AuthzError::InsufficientRole { role, ref required } => ApiError::Forbidden {
                message: err.to_string(),
                user_role: Some(role),
                required_roles: Some(required.clone()),
            },
            AuthzError::NotOwner => ApiError::forbidden(err.to_string()),
            AuthzError::TodoNotFound => ApiError::NotFound(err.to_string()),
            AuthzError::InvalidTarget => ApiError::BadRequest(err.to_string()),
            AuthzError::Store(store) => store.into(),
        }
    }
}

impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        ApiError::InternalError(format!("Password operation failed: {}", err))
    }
}

impl From<JwtError> for ApiError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::CreateError(_) => ApiError::internal(err),
            other => AuthError::from(other).into(),
        }
    }
}

impl From<OtpError> for ApiError {
    fn from(err: OtpError) -> Self {
        match err {
            OtpError::Hash(hash) => hash.into(),
            other => ApiError::BadRequest(other.to_string()),
        }
    }
}
