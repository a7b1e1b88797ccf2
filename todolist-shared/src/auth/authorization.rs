/// Declarative route authorization
///
/// Every guarded route declares the capabilities a caller needs as a
/// [`RoutePolicy`]. The API evaluates the policy for the matched route
/// before the handler runs, so handlers only ever see callers that passed.
///
/// # Capabilities
///
/// | capability | passes when |
/// |---|---|
/// | `Authenticated` | a session is present |
/// | `AnyRole(roles)` | the caller's role is in `roles` |
/// | `SelfOnly` | the `:id` path segment is the caller |
/// | `SelfOrAdmin` | `:id` is the caller, or the caller is an admin |
/// | `TodoOwnerOrAdmin` | the caller owns todo `:id`, or is an admin |
///
/// Every capability implies `Authenticated`.
///
/// # Example
///
/// ```
/// use axum::http::Method;
/// use todolist_shared::auth::authorization::{Capability, RoutePolicy};
/// use todolist_shared::models::UserRole;
///
/// static POLICIES: &[RoutePolicy] = &[RoutePolicy {
///     method: Method::GET,
///     path: "/api/v1/users",
///     requires: &[Capability::AnyRole(&[UserRole::Admin])],
/// }];
///
/// assert!(RoutePolicy::find(POLICIES, &Method::GET, "/api/v1/users").is_some());
/// ```

use axum::http::Method;
use uuid::Uuid;

use super::middleware::AuthContext;
use crate::models::UserRole;
use crate::store::{StoreError, TodoStore};

/// One requirement a caller must meet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Authenticated,
    AnyRole(&'static [UserRole]),
    SelfOnly,
    SelfOrAdmin,
    TodoOwnerOrAdmin,
}

impl Capability {
    /// Whether this capability needs the `:id` path parameter
    pub fn needs_target(&self) -> bool {
        matches!(
            self,
            Capability::SelfOnly | Capability::SelfOrAdmin | Capability::TodoOwnerOrAdmin
        )
    }
}

/// Capabilities required for one `(method, route template)` pair
#[derive(Debug, Clone)]
pub struct RoutePolicy {
    pub method: Method,

    /// Route template exactly as registered with the router
    pub path: &'static str,

    pub requires: &'static [Capability],
}

impl RoutePolicy {
    /// Looks up the policy for a matched route
    pub fn find<'a>(policies: &'a [RoutePolicy], method: &Method, path: &str) -> Option<&'a RoutePolicy> {
        policies
            .iter()
            .find(|policy| policy.method == *method && policy.path == path)
    }
}

/// Error type for authorization checks
#[derive(Debug, thiserror::Error)]
pub enum AuthzError {
    /// Guarded route reached without a session
    #[error("Unauthorized: User not authenticated")]
    Unauthenticated,

    /// Caller's role is not in the allowed list
    #[error("Forbidden: You do not have permission to access this resource")]
    InsufficientRole {
        role: UserRole,
        required: Vec<UserRole>,
    },

    /// Caller neither owns the resource nor is an admin
    #[error("Forbidden")]
    NotOwner,

    /// The todo named by the path does not exist
    #[error("Todo not found")]
    TodoNotFound,

    /// The `:id` path segment is missing or not a UUID
    #[error("Invalid id")]
    InvalidTarget,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Checks the caller's role against `allowed`
pub fn require_role(auth: &AuthContext, allowed: &[UserRole]) -> Result<(), AuthzError> {
    if allowed.contains(&auth.role) {
        return Ok(());
    }

    Err(AuthzError::InsufficientRole {
        role: auth.role,
        required: allowed.to_vec(),
    })
}

/// Passes when the caller is `target`
pub fn require_self(auth: &AuthContext, target: Uuid) -> Result<(), AuthzError> {
    if auth.user_id != target {
        return Err(AuthzError::NotOwner);
    }

    Ok(())
}

/// Passes when the caller is `owner` or an admin
pub fn require_owner_or_admin(auth: &AuthContext, owner: Uuid) -> Result<(), AuthzError> {
    if auth.user_id == owner || auth.is_admin() {
        return Ok(());
    }

    Err(AuthzError::NotOwner)
}

/// Evaluates `requires` in order, stopping at the first failure
///
/// `target` is the raw `:id` path segment, if the route has one. Only
/// `TodoOwnerOrAdmin` touches the store.
pub async fn evaluate<S>(
    requires: &[Capability],
    auth: Option<&AuthContext>,
    target: Option<&str>,
    todos: &S,
) -> Result<(), AuthzError>
where
    S: TodoStore + ?Sized,
{
    if requires.is_empty() {
        return Ok(());
    }

    let auth = auth.ok_or(AuthzError::Unauthenticated)?;

    let target_id = || -> Result<Uuid, AuthzError> {
        target
            .and_then(|raw| Uuid::parse_str(raw).ok())
            .ok_or(AuthzError::InvalidTarget)
    };

    for capability in requires {
        match *capability {
            Capability::Authenticated => {}
            Capability::AnyRole(roles) => require_role(auth, roles)?,
            Capability::SelfOnly => require_self(auth, target_id()?)?,
            Capability::SelfOrAdmin => require_owner_or_admin(auth, target_id()?)?,
            Capability::TodoOwnerOrAdmin => {
                let todo = todos
                    .find_todo(target_id()?)
                    .await?
                    .ok_or(AuthzError::TodoNotFound)?;
                require_owner_or_admin(auth, todo.user_id)?;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn caller(role: UserRole) -> AuthContext {
        AuthContext {
            user_id: Uuid::new_v4(),
            email: "a@example.com".to_string(),
            role,
        }
    }

    #[test]
    fn test_find_policy() {
        static POLICIES: &[RoutePolicy] = &[RoutePolicy {
            method: Method::DELETE,
            path: "/api/v1/todo/delete/:id",
            requires: &[Capability::TodoOwnerOrAdmin],
        }];

        assert!(RoutePolicy::find(POLICIES, &Method::DELETE, "/api/v1/todo/delete/:id").is_some());
        assert!(RoutePolicy::find(POLICIES, &Method::GET, "/api/v1/todo/delete/:id").is_none());
    }

    #[tokio::test]
    async fn test_anonymous_rejected_on_guarded_route() {
        let store = MemoryStore::new();
        let result = evaluate(&[Capability::Authenticated], None, None, &store).await;

        assert!(matches!(result, Err(AuthzError::Unauthenticated)));
        assert!(evaluate(&[], None, None, &store).await.is_ok());
    }

    #[tokio::test]
    async fn test_role_mismatch_reports_roles() {
        let store = MemoryStore::new();
        let user = caller(UserRole::User);

        let err = evaluate(&[Capability::AnyRole(&[UserRole::Admin])], Some(&user), None, &store)
            .await
            .unwrap_err();

        match err {
            AuthzError::InsufficientRole { role, required } => {
                assert_eq!(role, UserRole::User);
                assert_eq!(required, vec![UserRole::Admin]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_self_checks() {
        let store = MemoryStore::new();
        let user = caller(UserRole::User);
        let admin = caller(UserRole::Admin);
        let own = user.user_id.to_string();
        let other = Uuid::new_v4().to_string();

        assert!(evaluate(&[Capability::SelfOnly], Some(&user), Some(&own), &store).await.is_ok());
        assert!(matches!(
            evaluate(&[Capability::SelfOnly], Some(&admin), Some(&own), &store).await,
            Err(AuthzError::NotOwner)
        ));
        assert!(evaluate(&[Capability::SelfOrAdmin], Some(&admin), Some(&other), &store)
            .await
            .is_ok());
        assert!(matches!(
            evaluate(&[Capability::SelfOrAdmin], Some(&user), Some("not-a-uuid"), &store).await,
            Err(AuthzError::InvalidTarget)
        ));
    }

    #[tokio::test]
    async fn test_todo_owner_or_admin() {
        let store = MemoryStore::new();
        let owner = caller(UserRole::User);
        let stranger = caller(UserRole::User);
        let admin = caller(UserRole::Admin);
        let todo = store.create_todo(owner.user_id, "mine").await.unwrap();
        let id = todo.id.to_string();
        let requires = [Capability::TodoOwnerOrAdmin];

        assert!(evaluate(&requires, Some(&owner), Some(&id), &store).await.is_ok());
        assert!(evaluate(&requires, Some(&admin), Some(&id), &store).await.is_ok());
        assert!(matches!(
            evaluate(&requires, Some(&stranger), Some(&id), &store).await,
            Err(AuthzError::NotOwner)
        ));

        let missing = Uuid::new_v4().to_string();
        assert!(matches!(
            evaluate(&requires, Some(&owner), Some(&missing), &store).await,
            Err(AuthzError::TodoNotFound)
        ));
    }
}
