/// Route authorization policies
///
/// [`ROUTE_POLICIES`] is the single table of who may call what. Routes not
/// listed are public. [`enforce`] is installed with `route_layer`, so it sees
/// the matched route template and runs before any handler.

use axum::{
    extract::{MatchedPath, RawPathParams, Request, State},
    http::Method,
    middleware::Next,
    response::{IntoResponse, Response},
};
use todolist_shared::auth::authorization::{evaluate, Capability, RoutePolicy};
use todolist_shared::models::UserRole;

use super::session;
use crate::app::AppState;
use crate::error::ApiError;

const ADMIN: &[UserRole] = &[UserRole::Admin];
const MEMBERS: &[UserRole] = &[UserRole::User, UserRole::Admin];

/// Who may call each guarded route
pub static ROUTE_POLICIES: &[RoutePolicy] = &[
    // Auth
    RoutePolicy {
        method: Method::POST,
        path: "/api/v1/auth/users/send-otp-verify",
        requires: &[Capability::Authenticated],
    },
    RoutePolicy {
        method: Method::POST,
        path: "/api/v1/auth/users/verify-otp",
        requires: &[Capability::Authenticated],
    },
    // Users
    RoutePolicy {
        method: Method::GET,
        path: "/api/v1/users",
        requires: &[Capability::AnyRole(ADMIN)],
    },
    RoutePolicy {
        method: Method::GET,
        path: "/api/v1/users/current",
        requires: &[Capability::Authenticated],
    },
    RoutePolicy {
        method: Method::GET,
        path: "/api/v1/users/:id",
        requires: &[Capability::AnyRole(MEMBERS)],
    },
    RoutePolicy {
        method: Method::PUT,
        path: "/api/v1/users/update/:id",
        requires: &[Capability::AnyRole(MEMBERS), Capability::SelfOnly],
    },
    RoutePolicy {
        method: Method::DELETE,
        path: "/api/v1/users/delete/:id",
        requires: &[Capability::AnyRole(MEMBERS), Capability::SelfOrAdmin],
    },
    // Todos
    RoutePolicy {
        method: Method::GET,
        path: "/api/v1/todo/user/:id",
        requires: &[Capability::AnyRole(MEMBERS), Capability::SelfOrAdmin],
    },
    RoutePolicy {
        method: Method::GET,
        path: "/api/v1/todo/:id",
        requires: &[Capability::AnyRole(MEMBERS)],
    },
    RoutePolicy {
        method: Method::POST,
        path: "/api/v1/todo/create",
        requires: &[Capability::AnyRole(MEMBERS)],
    },
    RoutePolicy {
        method: Method::PATCH,
        path: "/api/v1/todo/update/:id",
        requires: &[Capability::AnyRole(MEMBERS)],
    },
    RoutePolicy {
        method: Method::PATCH,
        path: "/api/v1/todo/reorder",
        requires: &[Capability::AnyRole(MEMBERS)],
    },
    RoutePolicy {
        method: Method::DELETE,
        path: "/api/v1/todo/delete/:id",
        requires: &[Capability::AnyRole(MEMBERS), Capability::TodoOwnerOrAdmin],
    },
    // The :id segment is ignored; scope comes from the caller's role.
    RoutePolicy {
        method: Method::DELETE,
        path: "/api/v1/todo/delete/:id/clear-completed",
        requires: &[Capability::AnyRole(MEMBERS)],
    },
];

pub async fn enforce(
    State(state): State<AppState>,
    params: Option<RawPathParams>,
    req: Request,
    next: Next,
) -> Response {
    let Some(policy) = req
        .extensions()
        .get::<MatchedPath>()
        .and_then(|path| RoutePolicy::find(ROUTE_POLICIES, req.method(), path.as_str()))
    else {
        return next.run(req).await;
    };

    if policy.requires.is_empty() {
        return next.run(req).await;
    }

    if let Some(rejected) = session::rejection(&req) {
        return ApiError::from(rejected).into_response();
    }

    let auth = session::current(&req).cloned();
    let target = params.as_ref().and_then(|params| {
        params
            .iter()
            .find(|(name, _)| *name == "id")
            .map(|(_, value)| value.to_string())
    });

    if let Err(err) = evaluate(
        policy.requires,
        auth.as_ref(),
        target.as_deref(),
        state.store.as_ref(),
    )
    .await
    {
        tracing::warn!(
            route = policy.path,
            method = %policy.method,
            user_id = ?auth.as_ref().map(|a| a.user_id),
            error = %err,
            "Access denied"
        );
        return ApiError::from(err).into_response();
    }

    next.run(req).await
}
