/// Session resolution for Axum
///
/// A request carries its session token either in the `AccessToken` cookie
/// (set by login) or in an `Authorization: Bearer <token>` header; the
/// cookie wins when both are present.
///
/// [`authenticate`] turns request headers into an optional [`AuthContext`].
/// No token is not an error: the request simply continues anonymously and
/// the route policy decides whether that is acceptable. The API's session
/// middleware stores the resulting context in the request extensions, where
/// handlers pick it up with the [`AuthContext`] extractor.
///
/// # Example
///
/// ```
/// use todolist_shared::auth::middleware::AuthContext;
///
/// async fn handler(auth: AuthContext) -> String {
///     format!("Hello, user {}!", auth.user_id)
/// }
/// ```

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::jwt::{validate_token, Claims, JwtError};
use crate::models::UserRole;

/// Name of the session cookie
pub const ACCESS_TOKEN_COOKIE: &str = "AccessToken";

/// Authenticated caller, stored in request extensions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthContext {
    pub user_id: Uuid,

    pub email: String,

    pub role: UserRole,
}

impl AuthContext {
    pub fn from_claims(claims: Claims) -> Self {
        Self {
            user_id: claims.sub,
            email: claims.email,
            role: claims.role,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

/// Error type for session resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// No session on a route that needs one
    #[error("Unauthorized: User not authenticated")]
    MissingCredentials,

    /// Token verified but carries no usable subject
    #[error("Invalid token. Not authorized!")]
    InvalidClaims,

    /// Signature, issuer or expiry check failed
    #[error("Invalid or expired token.")]
    InvalidToken,
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::MissingCredentials | AuthError::InvalidClaims => StatusCode::UNAUTHORIZED,
            AuthError::InvalidToken => StatusCode::FORBIDDEN,
        }
    }
}

impl From<JwtError> for AuthError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::InvalidClaims(_) => AuthError::InvalidClaims,
            _ => AuthError::InvalidToken,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = serde_json::json!({
            "error": if status == StatusCode::FORBIDDEN { "forbidden" } else { "unauthorized" },
            "message": self.to_string(),
        });

        (status, Json(body)).into_response()
    }
}

/// Session token from the cookie or the bearer header
pub fn extract_token(headers: &HeaderMap) -> Option<&str> {
    let from_cookie = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == ACCESS_TOKEN_COOKIE)
        .map(|(_, token)| token.trim())
        .filter(|token| !token.is_empty());

    from_cookie.or_else(|| {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
    })
}

/// Resolves the caller from request headers
///
/// `Ok(None)` when no token was sent.
pub fn authenticate(headers: &HeaderMap, secret: &str) -> Result<Option<AuthContext>, AuthError> {
    let Some(token) = extract_token(headers) else {
        return Ok(None);
    };

    let claims = validate_token(token, secret)?;
    Ok(Some(AuthContext::from_claims(claims)))
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .ok_or(AuthError::MissingCredentials)
    }
}
