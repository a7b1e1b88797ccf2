/// PostgreSQL-backed store
///
/// Thin adapter from the store traits to the model queries in
/// [`crate::models`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{Store, StoreResult, TodoStore, UserStore};
use crate::db::pool::health_check;
use crate::models::{
    CompletedScope, CreateUser, DeletedTodo, OtpPurpose, ReorderItem, Todo, UpdateProfile,
    UpdateTodo, User,
};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn create_user(&self, data: CreateUser) -> StoreResult<User> {
        Ok(User::create(&self.pool, data).await?)
    }

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(User::find_by_id(&self.pool, id).await?)
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(User::find_by_email(&self.pool, email).await?)
    }

    async fn list_members(&self) -> StoreResult<Vec<User>> {
        Ok(User::list_members(&self.pool).await?)
    }

    async fn count_users(&self) -> StoreResult<i64> {
        Ok(User::count(&self.pool).await?)
    }

    async fn update_profile(&self, id: Uuid, data: UpdateProfile) -> StoreResult<Option<User>> {
        Ok(User::update_profile(&self.pool, id, data).await?)
    }

    async fn store_otp(
        &self,
        id: Uuid,
        purpose: OtpPurpose,
        hash: &str,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        Ok(User::store_otp(&self.pool, id, purpose, hash, expires_at).await?)
    }

    async fn clear_otp(&self, id: Uuid, purpose: OtpPurpose) -> StoreResult<bool> {
        Ok(User::clear_otp(&self.pool, id, purpose).await?)
    }

    async fn mark_verified(&self, id: Uuid, expected_hash: &str) -> StoreResult<bool> {
        Ok(User::mark_verified(&self.pool, id, expected_hash).await?)
    }

    async fn reset_password(
        &self,
        id: Uuid,
        expected_hash: &str,
        password_hash: &str,
    ) -> StoreResult<bool> {
        Ok(User::reset_password(&self.pool, id, expected_hash, password_hash).await?)
    }

    async fn delete_user(&self, id: Uuid) -> StoreResult<Option<Vec<Uuid>>> {
        Ok(User::delete(&self.pool, id).await?)
    }
}

#[async_trait]
impl TodoStore for PgStore {
    async fn create_todo(&self, user_id: Uuid, title: &str) -> StoreResult<Todo> {
        Ok(Todo::create(&self.pool, user_id, title).await?)
    }

    async fn find_todo(&self, id: Uuid) -> StoreResult<Option<Todo>> {
        Ok(Todo::find_by_id(&self.pool, id).await?)
    }

    async fn find_owned_todo(&self, id: Uuid, user_id: Uuid) -> StoreResult<Option<Todo>> {
        Ok(Todo::find_owned(&self.pool, id, user_id).await?)
    }

    async fn page_todos(
        &self,
        user_id: Uuid,
        after: Option<i64>,
        fetch: i64,
    ) -> StoreResult<Vec<Todo>> {
        Ok(Todo::page(&self.pool, user_id, after, fetch).await?)
    }

    async fn count_todos(&self, user_id: Uuid) -> StoreResult<i64> {
        Ok(Todo::count_for_user(&self.pool, user_id).await?)
    }

    async fn update_todo(
        &self,
        id: Uuid,
        user_id: Uuid,
        data: UpdateTodo,
    ) -> StoreResult<Option<Todo>> {
        Ok(Todo::update(&self.pool, id, user_id, data).await?)
    }

    async fn delete_todo(&self, id: Uuid) -> StoreResult<bool> {
        Ok(Todo::delete(&self.pool, id).await?)
    }

    async fn delete_completed(&self, scope: CompletedScope) -> StoreResult<Vec<DeletedTodo>> {
        Ok(Todo::delete_completed(&self.pool, scope).await?)
    }

    async fn reorder_todos(&self, user_id: Uuid, items: &[ReorderItem]) -> StoreResult<u64> {
        Ok(Todo::reorder(&self.pool, user_id, items).await?)
    }
}

#[async_trait]
impl Store for PgStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(health_check(&self.pool).await?)
    }
}
