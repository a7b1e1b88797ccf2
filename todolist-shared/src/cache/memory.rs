/// Process-local cache backend
///
/// Every operation first sweeps entries whose deadline has passed, so the map
/// never holds more expired data than was written since the last call.
/// Deadlines use `tokio::time::Instant` and follow a paused test clock.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

use super::{CacheBackend, CacheError};

struct Entry {
    value: String,
    expires_at: Instant,
}

#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks the map and drops expired entries
    fn swept(&self) -> Result<MutexGuard<'_, HashMap<String, Entry>>, CacheError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| CacheError::Backend("memory cache lock poisoned".to_string()))?;

        let now = Instant::now();
        entries.retain(|_, entry| entry.expires_at > now);

        Ok(entries)
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        self.swept().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CacheBackend for MemoryCache {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self.swept()?.get(key).map(|entry| entry.value.clone()))
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        let expires_at = Instant::now() + ttl;
        self.swept()?
            .insert(key.to_string(), Entry { value, expires_at });
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.swept()?.remove(key);
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<u64, CacheError> {
        let mut entries = self.swept()?;
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        Ok((before - entries.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_sweep_on_access() {
        let cache = MemoryCache::new();
        cache.set("short", "a".to_string(), Duration::from_secs(1)).await.unwrap();
        cache.set("long", "b".to_string(), Duration::from_secs(60)).await.unwrap();
        assert_eq!(cache.len(), 2);

        tokio::time::advance(Duration::from_secs(2)).await;

        assert_eq!(cache.get("short").await.unwrap(), None);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("long").await.unwrap().as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn test_delete_prefix_counts() {
        let cache = MemoryCache::new();
        let ttl = Duration::from_secs(60);
        cache.set("todos_a_page_start", "1".to_string(), ttl).await.unwrap();
        cache.set("todos_a_page_3", "1".to_string(), ttl).await.unwrap();
        cache.set("todos_b_page_start", "1".to_string(), ttl).await.unwrap();

        assert_eq!(cache.delete_prefix("todos_a_page_").await.unwrap(), 2);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_overwrite_refreshes_ttl() {
        let cache = MemoryCache::new();
        cache.set("k", "old".to_string(), Duration::from_secs(60)).await.unwrap();
        cache.set("k", "new".to_string(), Duration::from_secs(60)).await.unwrap();

        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("new"));
        cache.delete("k").await.unwrap();
        assert!(cache.is_empty());
    }
}
