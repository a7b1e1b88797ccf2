/// In-memory store
///
/// Keeps users and todos in process-local maps behind one mutex. Used for
/// local development (`STORAGE_BACKEND=memory`) and by the API test suite.
/// Uniqueness rules and the all-or-nothing reorder match [`super::PgStore`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use super::{Store, StoreError, StoreResult, TodoStore, UserStore};
use crate::models::{
    CompletedScope, CreateUser, DeletedTodo, OtpPurpose, ReorderItem, Todo, UpdateProfile,
    UpdateTodo, User, UserRole,
};

#[derive(Default)]
struct MemoryData {
    users: HashMap<Uuid, User>,
    todos: HashMap<Uuid, Todo>,
}

impl MemoryData {
    fn title_taken(&self, user_id: Uuid, title: &str, except: Option<Uuid>) -> bool {
        self.todos
            .values()
            .any(|t| t.user_id == user_id && t.title == title && Some(t.id) != except)
    }

    fn owner_orders_unique(&self, user_id: Uuid) -> bool {
        let mut seen = HashSet::new();
        self.todos
            .values()
            .filter(|t| t.user_id == user_id)
            .all(|t| seen.insert(t.order))
    }
}

#[derive(Default)]
pub struct MemoryStore {
    data: Mutex<MemoryData>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn data(&self) -> StoreResult<MutexGuard<'_, MemoryData>> {
        self.data
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create_user(&self, data: CreateUser) -> StoreResult<User> {
        let mut store = self.data()?;

        if store.users.values().any(|u| u.email == data.email) {
            return Err(StoreError::DuplicateEmail);
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            first_name: data.first_name,
            last_name: data.last_name,
            email: data.email,
            password_hash: data.password_hash,
            role: data.role,
            is_account_verified: false,
            verify_otp: None,
            verify_otp_expires_at: None,
            reset_otp: None,
            reset_otp_expires_at: None,
            created_at: now,
            updated_at: now,
        };

        store.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.data()?.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(self.data()?.users.values().find(|u| u.email == email).cloned())
    }

    async fn list_members(&self) -> StoreResult<Vec<User>> {
        let mut users: Vec<User> = self
            .data()?
            .users
            .values()
            .filter(|u| u.role != UserRole::Admin)
            .cloned()
            .collect();
        users.sort_by_key(|u| u.created_at);
        Ok(users)
    }

    async fn count_users(&self) -> StoreResult<i64> {
        Ok(self.data()?.users.len() as i64)
    }

    async fn update_profile(&self, id: Uuid, data: UpdateProfile) -> StoreResult<Option<User>> {
        let mut store = self.data()?;
        let Some(user) = store.users.get_mut(&id) else {
            return Ok(None);
        };

        if let Some(first_name) = data.first_name {
            user.first_name = first_name;
        }
        if let Some(last_name) = data.last_name {
            user.last_name = last_name;
        }
        user.updated_at = Utc::now();

        Ok(Some(user.clone()))
    }

    async fn store_otp(
        &self,
        id: Uuid,
        purpose: OtpPurpose,
        hash: &str,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let mut store = self.data()?;
        let Some(user) = store.users.get_mut(&id) else {
            return Ok(false);
        };

        match purpose {
            OtpPurpose::Verify => {
                user.verify_otp = Some(hash.to_string());
                user.verify_otp_expires_at = Some(expires_at);
            }
            OtpPurpose::Reset => {
                user.reset_otp = Some(hash.to_string());
                user.reset_otp_expires_at = Some(expires_at);
            }
        }
        user.updated_at = Utc::now();

        Ok(true)
    }

    async fn clear_otp(&self, id: Uuid, purpose: OtpPurpose) -> StoreResult<bool> {
        let mut store = self.data()?;
        let Some(user) = store.users.get_mut(&id) else {
            return Ok(false);
        };

        match purpose {
            OtpPurpose::Verify => {
                user.verify_otp = None;
                user.verify_otp_expires_at = None;
            }
            OtpPurpose::Reset => {
                user.reset_otp = None;
                user.reset_otp_expires_at = None;
            }
        }
        user.updated_at = Utc::now();

        Ok(true)
    }

    async fn mark_verified(&self, id: Uuid, expected_hash: &str) -> StoreResult<bool> {
        let mut store = self.data()?;
        let Some(user) = store.users.get_mut(&id) else {
            return Ok(false);
        };

        if user.verify_otp.as_deref() != Some(expected_hash) {
            return Ok(false);
        }

        user.is_account_verified = true;
        user.verify_otp = None;
        user.verify_otp_expires_at = None;
        user.updated_at = Utc::now();

        Ok(true)
    }

    async fn reset_password(
        &self,
        id: Uuid,
        expected_hash: &str,
        password_hash: &str,
    ) -> StoreResult<bool> {
        let mut store = self.data()?;
        let Some(user) = store.users.get_mut(&id) else {
            return Ok(false);
        };

        if user.reset_otp.as_deref() != Some(expected_hash) {
            return Ok(false);
        }

        user.password_hash = password_hash.to_string();
        user.reset_otp = None;
        user.reset_otp_expires_at = None;
        user.updated_at = Utc::now();

        Ok(true)
    }

    async fn delete_user(&self, id: Uuid) -> StoreResult<Option<Vec<Uuid>>> {
        let mut store = self.data()?;

        if store.users.remove(&id).is_none() {
            return Ok(None);
        }

        let mut removed = Vec::new();
        store.todos.retain(|todo_id, todo| {
            if todo.user_id == id {
                removed.push(*todo_id);
                false
            } else {
                true
            }
        });

        Ok(Some(removed))
    }
}

#[async_trait]
impl TodoStore for MemoryStore {
    async fn create_todo(&self, user_id: Uuid, title: &str) -> StoreResult<Todo> {
        let mut store = self.data()?;

        if store.title_taken(user_id, title, None) {
            return Err(StoreError::DuplicateTitle);
        }

        let order = store
            .todos
            .values()
            .filter(|t| t.user_id == user_id)
            .map(|t| t.order)
            .max()
            .map_or(0, |max| max + 1);

        let now = Utc::now();
        let todo = Todo {
            id: Uuid::new_v4(),
            user_id,
            title: title.to_string(),
            completed: false,
            order,
            created_at: now,
            updated_at: now,
        };

        store.todos.insert(todo.id, todo.clone());
        Ok(todo)
    }

    async fn find_todo(&self, id: Uuid) -> StoreResult<Option<Todo>> {
        Ok(self.data()?.todos.get(&id).cloned())
    }

    async fn find_owned_todo(&self, id: Uuid, user_id: Uuid) -> StoreResult<Option<Todo>> {
        Ok(self
            .data()?
            .todos
            .get(&id)
            .filter(|t| t.user_id == user_id)
            .cloned())
    }

    async fn page_todos(
        &self,
        user_id: Uuid,
        after: Option<i64>,
        fetch: i64,
    ) -> StoreResult<Vec<Todo>> {
        let mut todos: Vec<Todo> = self
            .data()?
            .todos
            .values()
            .filter(|t| t.user_id == user_id && after.map_or(true, |cursor| t.order > cursor))
            .cloned()
            .collect();

        todos.sort_by_key(|t| t.order);
        todos.truncate(usize::try_from(fetch).unwrap_or(0));

        Ok(todos)
    }

    async fn count_todos(&self, user_id: Uuid) -> StoreResult<i64> {
        Ok(self
            .data()?
            .todos
            .values()
            .filter(|t| t.user_id == user_id)
            .count() as i64)
    }

    async fn update_todo(
        &self,
        id: Uuid,
        user_id: Uuid,
        data: UpdateTodo,
    ) -> StoreResult<Option<Todo>> {
        let mut store = self.data()?;

        if !store.todos.get(&id).is_some_and(|t| t.user_id == user_id) {
            return Ok(None);
        }
        if let Some(ref title) = data.title {
            if store.title_taken(user_id, title, Some(id)) {
                return Err(StoreError::DuplicateTitle);
            }
        }

        let Some(todo) = store.todos.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(title) = data.title {
            todo.title = title;
        }
        if let Some(completed) = data.completed {
            todo.completed = completed;
        }
        todo.updated_at = Utc::now();

        Ok(Some(todo.clone()))
    }

    async fn delete_todo(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.data()?.todos.remove(&id).is_some())
    }

    async fn delete_completed(&self, scope: CompletedScope) -> StoreResult<Vec<DeletedTodo>> {
        let mut store = self.data()?;
        let mut deleted = Vec::new();

        store.todos.retain(|_, todo| {
            let in_scope = match scope {
                CompletedScope::All => true,
                CompletedScope::Owner(user_id) => todo.user_id == user_id,
            };
            if todo.completed && in_scope {
                deleted.push(DeletedTodo {
                    id: todo.id,
                    user_id: todo.user_id,
                });
                false
            } else {
                true
            }
        });

        Ok(deleted)
    }

    async fn reorder_todos(&self, user_id: Uuid, items: &[ReorderItem]) -> StoreResult<u64> {
        let mut store = self.data()?;
        let snapshot = store.todos.clone();
        let now = Utc::now();
        let mut updated = 0;

        for item in items {
            if let Some(todo) = store.todos.get_mut(&item.id).filter(|t| t.user_id == user_id) {
                todo.order = item.order;
                todo.updated_at = now;
                updated += 1;
            }
        }

        if !store.owner_orders_unique(user_id) {
            store.todos = snapshot;
            return Err(StoreError::OrderConflict);
        }

        Ok(updated)
    }
}

#[async_trait]
impl Store for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> StoreResult<()> {
        self.data().map(|_| ())
    }
}
