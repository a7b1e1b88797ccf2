//! # Todolist Shared Library
//!
//! Types, storage and auth shared by the todolist API server and the email
//! worker.
//!
//! ## Module Organization
//!
//! - `models`: Users and todos
//! - `store`: Storage traits with PostgreSQL and in-memory backends
//! - `db`: Connection pool and migrations
//! - `auth`: Passwords, JWTs, OTPs and route policies
//! - `cache`: TTL cache service over memory or Redis
//! - `mail`: Email job queue shared by the API (producer) and the worker (consumer)
//! - `pagination`: Keyset pagination over a todo list
//! - `active_users`: Sliding-window tracker for the `active_users` gauge
//! - `logging`: Subscriber setup and payload redaction
//! - `redis`: Redis connection management

pub mod active_users;
pub mod auth;
pub mod cache;
pub mod db;
pub mod logging;
pub mod mail;
pub mod models;
pub mod pagination;
pub mod redis;
pub mod store;

/// Current version of the todolist shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
