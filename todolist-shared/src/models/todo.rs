/// Todo model and database operations
///
/// Todos belong to exactly one user. The per-owner `order` column drives both
/// the manual sort in the UI and keyset pagination.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE todos (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     title VARCHAR(30) NOT NULL,
///     completed BOOLEAN NOT NULL DEFAULT FALSE,
///     "order" BIGINT NOT NULL DEFAULT 0 CHECK ("order" >= 0),
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     CONSTRAINT todos_user_id_title_key UNIQUE (user_id, title),
///     CONSTRAINT todos_user_id_order_key UNIQUE (user_id, "order")
///         DEFERRABLE INITIALLY DEFERRED
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

const TODO_COLUMNS: &str = r#"id, user_id, title, completed, "order", created_at, updated_at"#;

/// A single todo item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Todo {
    #[serde(rename = "_id")]
    pub id: Uuid,

    /// Owner
    pub user_id: Uuid,

    /// Trimmed, 2 to 30 characters, unique per owner
    pub title: String,

    pub completed: bool,

    /// Position in the owner's list, unique per owner
    pub order: i64,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

/// Partial update of a todo; absent fields are left untouched
#[derive(Debug, Clone, Default)]
pub struct UpdateTodo {
    pub title: Option<String>,
    pub completed: Option<bool>,
}

impl UpdateTodo {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.completed.is_none()
    }
}

/// One entry of a bulk reorder request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReorderItem {
    #[serde(rename = "_id", alias = "id")]
    pub id: Uuid,

    pub order: i64,
}

/// A row removed by a bulk delete
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::FromRow)]
pub struct DeletedTodo {
    pub id: Uuid,
    pub user_id: Uuid,
}

/// Which completed todos a bulk delete may touch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletedScope {
    /// Every user's completed todos
    All,

    /// Only this owner's completed todos
    Owner(Uuid),
}

impl Todo {
    /// Inserts a todo at the end of the owner's list
    ///
    /// The new `order` is the owner's current maximum plus one, or 0 for an
    /// empty list.
    pub async fn create(pool: &PgPool, user_id: Uuid, title: &str) -> Result<Self, sqlx::Error> {
        let query = format!(
            r#"
            INSERT INTO todos (user_id, title, "order")
            SELECT $1, $2, COALESCE(MAX("order") + 1, 0) FROM todos WHERE user_id = $1
            RETURNING {TODO_COLUMNS}
            "#
        );

        sqlx::query_as::<_, Todo>(&query)
            .bind(user_id)
            .bind(title)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {TODO_COLUMNS} FROM todos WHERE id = $1");

        sqlx::query_as::<_, Todo>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Finds a todo only if `user_id` owns it
    pub async fn find_owned(
        pool: &PgPool,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {TODO_COLUMNS} FROM todos WHERE id = $1 AND user_id = $2");

        sqlx::query_as::<_, Todo>(&query)
            .bind(id)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// Keyset page: rows with `order > after`, ascending, at most `fetch` rows
    pub async fn page(
        pool: &PgPool,
        user_id: Uuid,
        after: Option<i64>,
        fetch: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            r#"
            SELECT {TODO_COLUMNS} FROM todos
            WHERE user_id = $1 AND ($2::BIGINT IS NULL OR "order" > $2)
            ORDER BY "order" ASC
            LIMIT $3
            "#
        );

        sqlx::query_as::<_, Todo>(&query)
            .bind(user_id)
            .bind(after)
            .bind(fetch)
            .fetch_all(pool)
            .await
    }

    pub async fn count_for_user(pool: &PgPool, user_id: Uuid) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM todos WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(pool)
            .await?;

        Ok(count)
    }

    /// Applies `data` to a todo owned by `user_id`
    ///
    /// Returns `None` when the todo does not exist or belongs to someone else.
    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        user_id: Uuid,
        data: UpdateTodo,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            r#"
            UPDATE todos SET
                title = COALESCE($3, title),
                completed = COALESCE($4, completed),
                updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            RETURNING {TODO_COLUMNS}
            "#
        );

        sqlx::query_as::<_, Todo>(&query)
            .bind(id)
            .bind(user_id)
            .bind(data.title)
            .bind(data.completed)
            .fetch_optional(pool)
            .await
    }

    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM todos WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Deletes completed todos in `scope`, returning what was removed
    pub async fn delete_completed(
        pool: &PgPool,
        scope: CompletedScope,
    ) -> Result<Vec<DeletedTodo>, sqlx::Error> {
        let owner = match scope {
            CompletedScope::All => None,
            CompletedScope::Owner(user_id) => Some(user_id),
        };

        sqlx::query_as::<_, DeletedTodo>(
            r#"
            DELETE FROM todos
            WHERE completed = TRUE AND ($1::UUID IS NULL OR user_id = $1)
            RETURNING id, user_id
            "#,
        )
        .bind(owner)
        .fetch_all(pool)
        .await
    }

    /// Rewrites `order` for the caller's todos in one transaction
    ///
    /// Items naming a todo the caller does not own are skipped. Any database
    /// error, including a duplicate order at commit time, rolls the whole
    /// batch back. Returns the number of rows updated.
    pub async fn reorder(
        pool: &PgPool,
        user_id: Uuid,
        items: &[ReorderItem],
    ) -> Result<u64, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let mut updated = 0;

        for item in items {
            let result = sqlx::query(
                r#"
                UPDATE todos SET "order" = $3, updated_at = NOW()
                WHERE id = $1 AND user_id = $2
                "#,
            )
            .bind(item.id)
            .bind(user_id)
            .bind(item.order)
            .execute(&mut *tx)
            .await?;

            updated += result.rows_affected();
        }

        tx.commit().await?;

        Ok(updated)
    }
}
