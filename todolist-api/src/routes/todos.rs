/// Todo endpoints
///
/// Every handler works on the caller's own todos except the two admin
/// paths: listing another user's todos (`SelfOrAdmin`) and deleting any
/// todo (`TodoOwnerOrAdmin`). Those checks run in the route policy before
/// the handler.
///
/// # Caching
///
/// - `todos_{userId}_page_{cursor|start}_limit_{n}`: one page of a list
/// - `todo_{todoId}_user_{userId}`: one item, scoped to its owner
///
/// Any mutation drops all of the owner's pages and the touched items.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

use todolist_shared::{
    auth::middleware::AuthContext,
    cache::keys,
    models::{CompletedScope, ReorderItem, Todo, UpdateTodo},
    pagination::{Page, PageRequest},
};

use crate::{
    app::AppState,
    error::{ApiError, ApiResult, ValidationErrorDetail},
    extract::{parse_id, ApiJson},
};

use super::users::{SOURCE_CACHE, SOURCE_DB};

const TITLE_MIN_CHARS: usize = 2;
const TITLE_MAX_CHARS: usize = 30;

/// Raw `limit`/`cursor` query values; parsing is lenient
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub limit: Option<String>,
    pub cursor: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TodoPageResponse {
    pub source: &'static str,

    #[serde(flatten)]
    pub page: Page<Todo>,
}

#[derive(Debug, Serialize)]
pub struct TodoResponse {
    pub message: String,
    pub source: &'static str,
    pub todo: Todo,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateTodoRequest {
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UpdateTodoRequest {
    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub completed: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReorderRequest {
    #[serde(default)]
    pub order: Option<Vec<ReorderItem>>,
}

/// `{success, message, data}` returned by create and update
#[derive(Debug, Serialize)]
pub struct TodoMutation {
    pub success: bool,
    pub message: String,
    pub data: Todo,
}

#[derive(Debug, Serialize)]
pub struct ReorderResponse {
    pub success: bool,
    pub message: String,
    pub updated: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearCompletedResponse {
    pub message: String,
    pub deleted_count: usize,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub message: String,
}

/// Trims `raw` and checks its length in characters
pub fn validate_title(raw: &str) -> Result<String, ApiError> {
    let title = raw.trim();
    let chars = title.chars().count();

    let message = if title.is_empty() {
        "Title cannot be empty"
    } else if chars < TITLE_MIN_CHARS {
        "Title must be at least 2 characters long"
    } else if chars > TITLE_MAX_CHARS {
        "Title must not exceed 30 characters"
    } else {
        return Ok(title.to_string());
    };

    Err(ApiError::ValidationError(vec![ValidationErrorDetail::new(
        "title", message,
    )]))
}

fn todo_not_found() -> ApiError {
    ApiError::NotFound("Todo not found".to_string())
}

/// `GET /api/v1/todo/user/:id?limit&cursor` (self or admin)
pub async fn list_todos(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<TodoPageResponse>> {
    let user_id = parse_id(&id)?;
    let request = PageRequest::from_query(query.limit.as_deref(), query.cursor.as_deref());
    let key = request.cache_key(user_id);

    if let Some(page) = state.cache.get_json::<Page<Todo>>(&key).await {
        tracing::debug!(user_id = %user_id, key = %key, "Todo page served from cache");
        return Ok(Json(TodoPageResponse {
            source: SOURCE_CACHE,
            page,
        }));
    }

    let generation = state.cache.page_generation(user_id);
    let rows = state
        .store
        .page_todos(user_id, request.cursor, request.fetch_size())
        .await?;
    let total = state.store.count_todos(user_id).await?;
    let page = Page::from_rows(rows, &request, total, |todo| todo.order);

    state
        .cache
        .set_page_json(user_id, generation, &key, &page)
        .await;

    tracing::info!(
        user_id = %user_id,
        returned = page.data.len(),
        next_cursor = ?page.next_cursor,
        total,
        "Todo page fetched"
    );

    Ok(Json(TodoPageResponse {
        source: SOURCE_DB,
        page,
    }))
}

/// `GET /api/v1/todo/:id`; only the caller's own todos are visible
pub async fn get_todo(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<String>,
) -> ApiResult<Json<TodoResponse>> {
    let todo_id = parse_id(&id)?;
    let key = keys::todo(todo_id, auth.user_id);

    let (todo, source) = match state.cache.get_json::<Todo>(&key).await {
        Some(todo) => (todo, SOURCE_CACHE),
        None => {
            let todo = state
                .store
                .find_owned_todo(todo_id, auth.user_id)
                .await?
                .ok_or_else(|| {
                    tracing::warn!(todo_id = %todo_id, user_id = %auth.user_id, "Todo not found");
                    todo_not_found()
                })?;

            state.cache.set_json(&key, &todo, None).await;
            (todo, SOURCE_DB)
        }
    };

    Ok(Json(TodoResponse {
        message: "Todo fetched successfully".to_string(),
        source,
        todo,
    }))
}

/// `POST /api/v1/todo/create`
///
/// The new todo goes to the end of the caller's list.
pub async fn create_todo(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiJson(req): ApiJson<CreateTodoRequest>,
) -> ApiResult<(StatusCode, Json<TodoMutation>)> {
    let Some(raw) = req.title.as_deref() else {
        return Err(ApiError::ValidationError(vec![ValidationErrorDetail::new(
            "title",
            "Title is required",
        )]));
    };
    let title = validate_title(raw)?;

    let todo = state.store.create_todo(auth.user_id, &title).await?;
    state.cache.invalidate_todo_pages(auth.user_id).await;

    tracing::info!(todo_id = %todo.id, user_id = %auth.user_id, order = todo.order, "Todo created");

    Ok((
        StatusCode::CREATED,
        Json(TodoMutation {
            success: true,
            message: "Todo created successfully".to_string(),
            data: todo,
        }),
    ))
}

/// `PATCH /api/v1/todo/update/:id`
///
/// Needs at least one of `title` or `completed`.
pub async fn update_todo(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<UpdateTodoRequest>,
) -> ApiResult<Json<TodoMutation>> {
    let todo_id = parse_id(&id)?;

    let update = UpdateTodo {
        title: req.title.as_deref().map(validate_title).transpose()?,
        completed: req.completed,
    };
    if update.is_empty() {
        return Err(ApiError::BadRequest(
            "Provide at least one of title or completed".to_string(),
        ));
    }

    let todo = state
        .store
        .update_todo(todo_id, auth.user_id, update)
        .await?
        .ok_or_else(|| {
            tracing::warn!(todo_id = %todo_id, user_id = %auth.user_id, "Todo not found for update");
            todo_not_found()
        })?;

    state.cache.invalidate_todo(todo_id, auth.user_id).await;
    tracing::info!(todo_id = %todo_id, user_id = %auth.user_id, "Todo updated");

    Ok(Json(TodoMutation {
        success: true,
        message: "Todo updated successfully".to_string(),
        data: todo,
    }))
}

/// `PATCH /api/v1/todo/reorder`
///
/// All-or-nothing: a conflicting order rolls the whole batch back. Items
/// naming another user's todo are skipped and not counted in `updated`.
pub async fn reorder_todos(
    State(state): State<AppState>,
    auth: AuthContext,
    ApiJson(req): ApiJson<ReorderRequest>,
) -> ApiResult<Json<ReorderResponse>> {
    let items = req.order.unwrap_or_default();
    if items.is_empty() {
        return Err(ApiError::BadRequest(
            "Order must be a non-empty array".to_string(),
        ));
    }

    if items.iter().any(|item| item.order < 0) {
        return Err(ApiError::ValidationError(vec![ValidationErrorDetail::new(
            "order",
            "Order values must be non-negative integers",
        )]));
    }

    let distinct: BTreeSet<i64> = items.iter().map(|item| item.order).collect();
    if distinct.len() != items.len() {
        return Err(ApiError::ValidationError(vec![ValidationErrorDetail::new(
            "order",
            "Order values must be unique",
        )]));
    }

    let updated = state.store.reorder_todos(auth.user_id, &items).await?;

    state.cache.invalidate_todo_pages(auth.user_id).await;
    for item in &items {
        state.cache.invalidate(&keys::todo(item.id, auth.user_id)).await;
    }

    tracing::info!(user_id = %auth.user_id, requested = items.len(), updated, "Todos reordered");

    Ok(Json(ReorderResponse {
        success: true,
        message: "Todos reordered successfully".to_string(),
        updated,
    }))
}

/// `DELETE /api/v1/todo/delete/:id` (owner or admin)
pub async fn delete_todo(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<String>,
) -> ApiResult<Json<DeleteResponse>> {
    let todo_id = parse_id(&id)?;

    let todo = state.store.find_todo(todo_id).await?.ok_or_else(todo_not_found)?;

    if !state.store.delete_todo(todo_id).await? {
        return Err(todo_not_found());
    }

    state.cache.invalidate_todo(todo_id, todo.user_id).await;
    tracing::info!(
        todo_id = %todo_id,
        owner = %todo.user_id,
        deleted_by = %auth.user_id,
        "Todo deleted"
    );

    Ok(Json(DeleteResponse {
        message: "Todo deleted successfully".to_string(),
    }))
}

/// `DELETE /api/v1/todo/delete/:id/clear-completed`
///
/// Admins clear every user's completed todos, users only their own. The
/// `:id` segment is not used.
pub async fn clear_completed(
    State(state): State<AppState>,
    auth: AuthContext,
) -> ApiResult<Json<ClearCompletedResponse>> {
    let scope = if auth.is_admin() {
        CompletedScope::All
    } else {
        CompletedScope::Owner(auth.user_id)
    };

    let deleted = state.store.delete_completed(scope).await?;
    if deleted.is_empty() {
        tracing::info!(user_id = %auth.user_id, role = %auth.role, "No completed todos to delete");
        return Err(ApiError::NotFound("No completed todos found".to_string()));
    }

    let owners: BTreeSet<Uuid> = deleted.iter().map(|todo| todo.user_id).collect();
    for owner in &owners {
        state.cache.invalidate_todo_pages(*owner).await;
    }
    for todo in &deleted {
        state.cache.invalidate(&keys::todo(todo.id, todo.user_id)).await;
    }

    tracing::info!(
        user_id = %auth.user_id,
        role = %auth.role,
        deleted = deleted.len(),
        owners = owners.len(),
        "Completed todos deleted"
    );

    Ok(Json(ClearCompletedResponse {
        message: "Completed todos deleted successfully".to_string(),
        deleted_count: deleted.len(),
    }))
}
