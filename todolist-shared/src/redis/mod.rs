/// Redis connectivity
///
/// Redis is optional. When `REDIS_URL` is set the API uses it for the
/// response cache ([`crate::cache::RedisCache`]) and the email job queue
/// ([`crate::mail::RedisEmailQueue`]); otherwise both fall back to
/// in-process implementations.

pub mod client;

pub use client::{RedisClient, RedisClientError, RedisConfig};
