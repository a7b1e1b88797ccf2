//! # Todolist Worker Library
//!
//! Background delivery of the emails the API enqueues.
//!
//! ## Modules
//!
//! - `config`: Worker configuration and retry policy
//! - `mailer`: Email transports (Brevo, log-only)
//! - `templates`: HTML templates with `{{key}}` placeholders
//! - `worker`: Queue consumer with retry and backoff
//!
//! The API runs an [`worker::EmailWorker`] in-process by default; the
//! `todolist-worker` binary runs one against the Redis queue instead.

pub mod config;
pub mod mailer;
pub mod templates;
pub mod worker;
