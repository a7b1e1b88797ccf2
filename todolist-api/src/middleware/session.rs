/// Session resolution
///
/// Runs on every request. A valid token puts an [`AuthContext`] into the
/// request extensions and marks the user active. No token means anonymous.
/// A bad token is recorded as an [`AuthError`] extension rather than
/// rejected here: public routes ignore it, guarded routes turn it into a
/// 401/403 in [`super::policy`].

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use todolist_shared::active_users::mask_user_id;
use todolist_shared::auth::middleware::{authenticate, AuthContext, AuthError};

use crate::app::AppState;

pub async fn resolve(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    match authenticate(req.headers(), &state.config.jwt.secret) {
        Ok(Some(auth)) => {
            state.active_users.touch(auth.user_id);
            tracing::debug!(user = %mask_user_id(auth.user_id), role = %auth.role, "Session resolved");
            req.extensions_mut().insert(auth);
        }
        Ok(None) => {}
        Err(err) => {
            tracing::warn!(error = %err, path = %req.uri().path(), "Session token rejected");
            req.extensions_mut().insert(err);
        }
    }

    next.run(req).await
}

/// The caller resolved by [`resolve`], if any
pub fn current(req: &Request) -> Option<&AuthContext> {
    req.extensions().get::<AuthContext>()
}

/// Why the caller's token was rejected, if it was
pub fn rejection(req: &Request) -> Option<AuthError> {
    req.extensions().get::<AuthError>().copied()
}
