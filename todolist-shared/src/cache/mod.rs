/// Response cache
///
/// Handlers read and write JSON snapshots through [`CacheService`], which is
/// held in application state. The storage behind it is a [`CacheBackend`]:
///
/// - [`MemoryCache`]: process-local map, expired entries swept on every access
/// - [`RedisCache`]: shared Redis instance, expiry delegated to `SET EX`
///
/// The cache is best effort. Backend failures are logged and reported to the
/// caller as a miss, so a broken cache never fails a request.
///
/// # Page writes
///
/// A list page read from the store can be older than an invalidation that
/// lands while it is being written. [`CacheService::set_page_json`] compares
/// the owner's page generation from before the read with the one after the
/// write and removes the entry when they differ. Generations are
/// per-process; API instances sharing Redis only see each other's deletes.
///
/// # Keys
///
/// | key | ttl |
/// |---|---|
/// | `all_users` | default |
/// | `current_user_{id}` | 60 s |
/// | `user_{id}` | 600 s |
/// | `todos_{userId}_page_{cursor\|start}_limit_{n}` | default |
/// | `todo_{todoId}_user_{userId}` | default |

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::pagination::page_prefix;

pub mod memory;
pub mod redis;

pub use self::memory::MemoryCache;
pub use self::redis::RedisCache;

/// TTL applied when a write does not name one
pub const DEFAULT_TTL: Duration = Duration::from_secs(100);

/// TTL of `current_user_{id}`
pub const CURRENT_USER_TTL: Duration = Duration::from_secs(60);

/// TTL of `user_{id}`
pub const USER_TTL: Duration = Duration::from_secs(600);

/// Cache key builders
pub mod keys {
    use uuid::Uuid;

    pub const ALL_USERS: &str = "all_users";

    pub fn current_user(id: Uuid) -> String {
        format!("current_user_{id}")
    }

    pub fn user(id: Uuid) -> String {
        format!("user_{id}")
    }

    pub fn todo(todo_id: Uuid, user_id: Uuid) -> String {
        format!("todo_{todo_id}_user_{user_id}")
    }
}

/// Cache backend errors
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Cache backend error: {0}")]
    Backend(String),

    #[error("Redis error: {0}")]
    Redis(#[from] ::redis::RedisError),

    #[error("Cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Key/value storage with per-entry expiry
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Returns the stored value unless it has expired
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;

    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    /// Deletes every key starting with `prefix`, returning how many went
    async fn delete_prefix(&self, prefix: &str) -> Result<u64, CacheError>;
}

const GENERATION_STRIPES: usize = 64;

/// JSON cache facade used by handlers
#[derive(Clone)]
pub struct CacheService {
    backend: Arc<dyn CacheBackend>,
    default_ttl: Duration,

    /// Bumped on every page invalidation; users share stripes by id
    generations: Arc<[AtomicU64; GENERATION_STRIPES]>,
}

impl CacheService {
    pub fn new(backend: Arc<dyn CacheBackend>, default_ttl: Duration) -> Self {
        Self {
            backend,
            default_ttl,
            generations: Arc::new(std::array::from_fn(|_| AtomicU64::new(0))),
        }
    }

    /// In-process cache with the given default TTL
    pub fn in_memory(default_ttl: Duration) -> Self {
        Self::new(Arc::new(MemoryCache::new()), default_ttl)
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Reads and decodes `key`; any failure counts as a miss
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.backend.get(key).await {
            Ok(raw) => raw?,
            Err(e) => {
                tracing::warn!(key, error = %e, "Cache read failed");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => {
                tracing::debug!(key, "Cache hit");
                Some(value)
            }
            Err(e) => {
                tracing::warn!(key, error = %e, "Discarding undecodable cache entry");
                self.invalidate(key).await;
                None
            }
        }
    }

    /// Encodes and stores `value` under `key` for `ttl` (or the default)
    pub async fn set_json<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl: Option<Duration>) {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(key, error = %e, "Cache value not serializable");
                return;
            }
        };

        let ttl = ttl.unwrap_or(self.default_ttl);
        if let Err(e) = self.backend.set(key, raw, ttl).await {
            tracing::warn!(key, error = %e, "Cache write failed");
        }
    }

    pub async fn invalidate(&self, key: &str) {
        if let Err(e) = self.backend.delete(key).await {
            tracing::warn!(key, error = %e, "Cache delete failed");
        }
    }

    pub async fn invalidate_prefix(&self, prefix: &str) {
        match self.backend.delete_prefix(prefix).await {
            Ok(removed) => tracing::debug!(prefix, removed, "Cache prefix invalidated"),
            Err(e) => tracing::warn!(prefix, error = %e, "Cache prefix delete failed"),
        }
    }

    /// Drops every cached page of the owner's list plus the item entry
    pub async fn invalidate_todo(&self, todo_id: Uuid, user_id: Uuid) {
        self.invalidate_todo_pages(user_id).await;
        self.invalidate(&keys::todo(todo_id, user_id)).await;
    }

    /// Drops every cached page of the owner's list
    pub async fn invalidate_todo_pages(&self, user_id: Uuid) {
        self.generation_slot(user_id).fetch_add(1, Ordering::SeqCst);
        self.invalidate_prefix(&page_prefix(user_id)).await;
    }

    /// Taken before reading a page from the store, see [`Self::set_page_json`]
    pub fn page_generation(&self, user_id: Uuid) -> u64 {
        self.generation_slot(user_id).load(Ordering::SeqCst)
    }

    /// Caches one of `user_id`'s list pages unless its pages were
    /// invalidated after `generation` was taken
    ///
    /// Returns whether the entry was kept.
    pub async fn set_page_json<T: Serialize + ?Sized>(
        &self,
        user_id: Uuid,
        generation: u64,
        key: &str,
        value: &T,
    ) -> bool {
        if self.page_generation(user_id) != generation {
            return false;
        }

        self.set_json(key, value, None).await;

        // An invalidation may have run between the check and the write
        if self.page_generation(user_id) != generation {
            tracing::debug!(key, "Page invalidated while caching, dropping it");
            self.invalidate(key).await;
            return false;
        }

        true
    }

    fn generation_slot(&self, user_id: Uuid) -> &AtomicU64 {
        &self.generations[(user_id.as_u128() % GENERATION_STRIPES as u128) as usize]
    }

    /// Drops the user's own entries and the admin listing
    pub async fn invalidate_user(&self, user_id: Uuid) {
        self.invalidate(&keys::user(user_id)).await;
        self.invalidate(&keys::current_user(user_id)).await;
        self.invalidate(keys::ALL_USERS).await;
    }
}
