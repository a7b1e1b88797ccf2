//! # Todolist API Server Library
//!
//! The axum application behind the todo list backend.
//!
//! ## Modules
//!
//! - `app`: Application state and router builder
//! - `config`: Configuration management
//! - `error`: Error handling and HTTP response mapping
//! - `extract`: Extractors with JSON rejections
//! - `metrics`: Prometheus recorder, request metrics, system probe
//! - `middleware`: Security headers, request log, session, route policy
//! - `routes`: API route handlers

pub mod app;
pub mod config;
pub mod error;
pub mod extract;
pub mod metrics;
pub mod middleware;
pub mod routes;
