/// User account endpoints
///
/// Reads go through the cache (`all_users`, `current_user_{id}` for 60 s,
/// `user_{id}` for 10 min); writes invalidate the affected entries.
/// Guards live in the route policy table, so handlers only see callers that
/// already passed their role and ownership checks.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use todolist_shared::{
    auth::middleware::AuthContext,
    cache::{keys, CURRENT_USER_TTL, USER_TTL},
    models::{PublicUser, UpdateProfile},
};

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{parse_id, ApiJson},
};

/// Where a response body came from
pub const SOURCE_CACHE: &str = "cache";
pub const SOURCE_DB: &str = "db";

/// Cached body of the admin listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserListing {
    /// Every account, admins included
    pub count: i64,

    /// Non-admin accounts
    pub data: Vec<PublicUser>,
}

#[derive(Debug, Serialize)]
pub struct UserListResponse {
    pub message: String,
    pub source: &'static str,
    pub count: i64,
    pub data: Vec<PublicUser>,
}

#[derive(Debug, Serialize)]
pub struct CurrentUserResponse {
    pub success: bool,
    pub message: String,
    pub source: &'static str,
    pub user: PublicUser,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub message: String,
    pub source: &'static str,
    pub user: PublicUser,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    #[serde(default)]
    #[validate(length(min = 2, max = 30, message = "First name must be between 2 and 30 characters"))]
    pub first_name: Option<String>,

    #[serde(default)]
    #[validate(length(min = 2, max = 30, message = "Last name must be between 2 and 30 characters"))]
    pub last_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UpdateProfileResponse {
    pub message: String,
    pub data: PublicUser,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub message: String,
}

/// `GET /api/v1/users` (admin)
pub async fn list_users(
    State(state): State<AppState>,
    auth: AuthContext,
) -> ApiResult<Json<UserListResponse>> {
    if let Some(listing) = state.cache.get_json::<UserListing>(keys::ALL_USERS).await {
        tracing::info!(requested_by = %auth.user_id, "Users served from cache");
        return Ok(Json(UserListResponse {
            message: "Users fetched successfully".to_string(),
            source: SOURCE_CACHE,
            count: listing.count,
            data: listing.data,
        }));
    }

    let members = state.store.list_members().await?;
    if members.is_empty() {
        return Err(ApiError::NotFound("No users found".to_string()));
    }

    let listing = UserListing {
        count: state.store.count_users().await?,
        data: members.iter().map(PublicUser::from).collect(),
    };
    state.cache.set_json(keys::ALL_USERS, &listing, None).await;

    tracing::info!(
        requested_by = %auth.user_id,
        returned = listing.data.len(),
        "Users fetched from store and cached"
    );

    Ok(Json(UserListResponse {
        message: "Users fetched successfully".to_string(),
        source: SOURCE_DB,
        count: listing.count,
        data: listing.data,
    }))
}

/// `GET /api/v1/users/current`
pub async fn current_user(
    State(state): State<AppState>,
    auth: AuthContext,
) -> ApiResult<Json<CurrentUserResponse>> {
    let key = keys::current_user(auth.user_id);

    let (user, source) = match state.cache.get_json::<PublicUser>(&key).await {
        Some(user) => (user, SOURCE_CACHE),
        None => {
            let user = state
                .store
                .find_user(auth.user_id)
                .await?
                .map(PublicUser::from)
                .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

            state.cache.set_json(&key, &user, Some(CURRENT_USER_TTL)).await;
            (user, SOURCE_DB)
        }
    };

    Ok(Json(CurrentUserResponse {
        success: true,
        message: "User fetched successfully".to_string(),
        source,
        user,
    }))
}

/// `GET /api/v1/users/:id`
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<UserResponse>> {
    let id = parse_id(&id)?;
    let key = keys::user(id);

    if let Some(user) = state.cache.get_json::<PublicUser>(&key).await {
        tracing::debug!(user_id = %id, "User served from cache");
        return Ok(Json(UserResponse {
            message: "User fetched successfully".to_string(),
            source: SOURCE_CACHE,
            user,
        }));
    }

    let user = state
        .store
        .find_user(id)
        .await?
        .map(PublicUser::from)
        .ok_or_else(|| {
            tracing::warn!(user_id = %id, "User not found");
            ApiError::NotFound("User not found".to_string())
        })?;

    state.cache.set_json(&key, &user, Some(USER_TTL)).await;

    Ok(Json(UserResponse {
        message: "User fetched successfully".to_string(),
        source: SOURCE_DB,
        user,
    }))
}

/// `PUT /api/v1/users/update/:id` (self only)
///
/// Only the name fields can change. Absent fields are left alone.
pub async fn update_profile(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<UpdateProfileRequest>,
) -> ApiResult<Json<UpdateProfileResponse>> {
    let id = parse_id(&id)?;
    req.validate()?;

    let user = state
        .store
        .update_profile(
            id,
            UpdateProfile {
                first_name: req.first_name,
                last_name: req.last_name,
            },
        )
        .await?
        .ok_or_else(|| ApiError::NotFound("No user found".to_string()))?;

    state.cache.invalidate_user(id).await;
    tracing::info!(user_id = %id, "Profile updated");

    Ok(Json(UpdateProfileResponse {
        message: "User updated successfully".to_string(),
        data: PublicUser::from(&user),
    }))
}

/// `DELETE /api/v1/users/delete/:id` (self or admin)
///
/// The account's todos go with it.
pub async fn delete_account(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<String>,
) -> ApiResult<Json<DeleteResponse>> {
    let id = parse_id(&id)?;

    let Some(todo_ids) = state.store.delete_user(id).await? else {
        tracing::warn!(user_id = %id, "No user to delete");
        return Err(ApiError::NotFound("No user found".to_string()));
    };

    state.cache.invalidate_user(id).await;
    state.cache.invalidate_todo_pages(id).await;
    for todo_id in &todo_ids {
        state.cache.invalidate(&keys::todo(*todo_id, id)).await;
    }

    tracing::info!(
        user_id = %id,
        deleted_by = %auth.user_id,
        todos = todo_ids.len(),
        "User deleted"
    );

    Ok(Json(DeleteResponse {
        message: "User deleted successfully".to_string(),
    }))
}
