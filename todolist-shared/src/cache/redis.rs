/// Redis cache backend
///
/// Values are plain strings under `todolist:cache:{key}`. Expiry is left to
/// Redis (`SET .. EX`); prefix invalidation walks the keyspace with
/// `SCAN MATCH` and deletes each batch.

use ::redis::aio::ConnectionManager;
use async_trait::async_trait;
use std::time::Duration;

use super::{CacheBackend, CacheError};
use crate::redis::RedisClient;

/// Namespace prepended to every cache key
pub const KEY_NAMESPACE: &str = "todolist:cache:";

const SCAN_BATCH: usize = 200;

#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
}

impl RedisCache {
    pub fn new(client: &RedisClient) -> Self {
        Self {
            conn: client.get_connection(),
        }
    }

    fn namespaced(key: &str) -> String {
        format!("{KEY_NAMESPACE}{key}")
    }
}

/// Escapes glob metacharacters so a prefix matches literally in `SCAN MATCH`
fn escape_glob(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[async_trait]
impl CacheBackend for RedisCache {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.conn.clone();
        let value = ::redis::cmd("GET")
            .arg(Self::namespaced(key))
            .query_async::<_, Option<String>>(&mut conn)
            .await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        ::redis::cmd("SET")
            .arg(Self::namespaced(key))
            .arg(value)
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        ::redis::cmd("DEL")
            .arg(Self::namespaced(key))
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<u64, CacheError> {
        let mut conn = self.conn.clone();
        let pattern = format!("{}*", escape_glob(&Self::namespaced(prefix)));
        let mut cursor: u64 = 0;
        let mut removed = 0;

        loop {
            let (next, keys): (u64, Vec<String>) = ::redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await?;

            if !keys.is_empty() {
                removed += ::redis::cmd("DEL")
                    .arg(&keys)
                    .query_async::<_, u64>(&mut conn)
                    .await?;
            }

            if next == 0 {
                break;
            }
            cursor = next;
        }

        Ok(removed)
    }
}
