/// Storage abstraction for users and todos
///
/// Handlers talk to the [`Store`] trait object held in application state.
/// Two implementations ship with the crate:
///
/// - [`PgStore`]: PostgreSQL through sqlx (production)
/// - [`MemoryStore`]: process-local maps (development and tests)
///
/// Both enforce the same uniqueness rules: one account per email, one title
/// per owner, one `order` value per owner.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{
    CompletedScope, CreateUser, DeletedTodo, OtpPurpose, ReorderItem, Todo, UpdateProfile,
    UpdateTodo, User,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Constraint names shared by the migrations and the error mapping
pub const USERS_EMAIL_KEY: &str = "users_email_key";
pub const TODOS_TITLE_KEY: &str = "todos_user_id_title_key";
pub const TODOS_ORDER_KEY: &str = "todos_user_id_order_key";

/// Error type for store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Another account already uses this email
    #[error("User already exists")]
    DuplicateEmail,

    /// The owner already has a todo with this title
    #[error("Todo with this title already exists")]
    DuplicateTitle,

    /// Two of the owner's todos would share an `order` value
    #[error("Todo order values must be unique")]
    OrderConflict,

    /// Underlying database failure
    #[error("Database error: {0}")]
    Database(#[source] sqlx::Error),

    /// Backend could not serve the request
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = err {
            match db_err.constraint() {
                Some(USERS_EMAIL_KEY) => return StoreError::DuplicateEmail,
                Some(TODOS_TITLE_KEY) => return StoreError::DuplicateTitle,
                Some(TODOS_ORDER_KEY) => return StoreError::OrderConflict,
                _ => {}
            }
        }

        StoreError::Database(err)
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Account persistence
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create_user(&self, data: CreateUser) -> StoreResult<User>;

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>>;

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    /// Every account whose role is not `admin`
    async fn list_members(&self) -> StoreResult<Vec<User>>;

    async fn count_users(&self) -> StoreResult<i64>;

    async fn update_profile(&self, id: Uuid, data: UpdateProfile) -> StoreResult<Option<User>>;

    async fn store_otp(
        &self,
        id: Uuid,
        purpose: OtpPurpose,
        hash: &str,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<bool>;

    async fn clear_otp(&self, id: Uuid, purpose: OtpPurpose) -> StoreResult<bool>;

    /// Compare-and-clear of the verification slot; `false` if it moved on
    async fn mark_verified(&self, id: Uuid, expected_hash: &str) -> StoreResult<bool>;

    /// Compare-and-clear of the reset slot plus the password swap
    async fn reset_password(
        &self,
        id: Uuid,
        expected_hash: &str,
        password_hash: &str,
    ) -> StoreResult<bool>;

    /// Removes the account and its todos; `None` when it does not exist,
    /// otherwise the ids of the removed todos
    async fn delete_user(&self, id: Uuid) -> StoreResult<Option<Vec<Uuid>>>;
}

/// Todo persistence
#[async_trait]
pub trait TodoStore: Send + Sync {
    async fn create_todo(&self, user_id: Uuid, title: &str) -> StoreResult<Todo>;

    async fn find_todo(&self, id: Uuid) -> StoreResult<Option<Todo>>;

    async fn find_owned_todo(&self, id: Uuid, user_id: Uuid) -> StoreResult<Option<Todo>>;

    /// Up to `fetch` of the owner's todos with `order > after`, ascending
    async fn page_todos(
        &self,
        user_id: Uuid,
        after: Option<i64>,
        fetch: i64,
    ) -> StoreResult<Vec<Todo>>;

    async fn count_todos(&self, user_id: Uuid) -> StoreResult<i64>;

    async fn update_todo(
        &self,
        id: Uuid,
        user_id: Uuid,
        data: UpdateTodo,
    ) -> StoreResult<Option<Todo>>;

    async fn delete_todo(&self, id: Uuid) -> StoreResult<bool>;

    /// Returns the id and owner of every deleted row
    async fn delete_completed(&self, scope: CompletedScope) -> StoreResult<Vec<DeletedTodo>>;

    /// All-or-nothing bulk reorder of the caller's todos
    async fn reorder_todos(&self, user_id: Uuid, items: &[ReorderItem]) -> StoreResult<u64>;
}

/// Complete backing store
#[async_trait]
pub trait Store: UserStore + TodoStore {
    /// Short backend name for logs and health output
    fn backend(&self) -> &'static str;

    /// Round-trip to the backend
    async fn ping(&self) -> StoreResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_not_found_stays_database_error() {
        let err = StoreError::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, StoreError::Database(sqlx::Error::RowNotFound)));
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(StoreError::DuplicateEmail.to_string(), "User already exists");
        assert_eq!(
            StoreError::DuplicateTitle.to_string(),
            "Todo with this title already exists"
        );
    }
}
