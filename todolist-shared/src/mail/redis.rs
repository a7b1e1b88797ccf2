/// Redis-backed email queue
///
/// Jobs are JSON strings on the list `todolist:email_queue`: producers
/// `LPUSH`, the consumer `BRPOP`s, giving FIFO order.
///
/// `BRPOP` parks the connection it runs on. Give the consumer its own
/// [`RedisClient`] rather than sharing the one behind the cache.

use ::redis::aio::ConnectionManager;
use async_trait::async_trait;
use std::time::Duration;

use super::{EmailJob, EmailQueue, QueueError};
use crate::redis::RedisClient;

pub const QUEUE_KEY: &str = "todolist:email_queue";

#[derive(Clone)]
pub struct RedisEmailQueue {
    conn: ConnectionManager,
    key: String,
}

impl RedisEmailQueue {
    pub fn new(client: &RedisClient) -> Self {
        Self::with_key(client, QUEUE_KEY)
    }

    pub fn with_key(client: &RedisClient, key: impl Into<String>) -> Self {
        Self {
            conn: client.get_connection(),
            key: key.into(),
        }
    }
}

#[async_trait]
impl EmailQueue for RedisEmailQueue {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn enqueue(&self, job: EmailJob) -> Result<(), QueueError> {
        let payload = serde_json::to_string(&job)?;
        let mut conn = self.conn.clone();

        ::redis::cmd("LPUSH")
            .arg(&self.key)
            .arg(payload)
            .query_async::<_, ()>(&mut conn)
            .await?;

        Ok(())
    }

    async fn dequeue(&self, wait: Duration) -> Result<Option<EmailJob>, QueueError> {
        let mut conn = self.conn.clone();

        let popped: Option<(String, String)> = ::redis::cmd("BRPOP")
            .arg(&self.key)
            .arg(wait.as_secs_f64())
            .query_async(&mut conn)
            .await?;

        match popped {
            Some((_, payload)) => Ok(Some(serde_json::from_str(&payload)?)),
            None => Ok(None),
        }
    }
}
