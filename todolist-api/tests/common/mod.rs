//! Common test utilities for integration tests
//!
//! This module provides shared infrastructure for integration tests:
//! - An in-memory application (store, cache and email queue)
//! - Test user creation with ready-made JWTs
//! - Request helpers driving the router without a socket
//! - Access to queued OTP emails

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use std::time::Duration;
use tower::ServiceExt;
use uuid::Uuid;

use todolist_api::app::{build_router, AppState};
use todolist_api::config::{ApiConfig, CacheConfig, Config, JwtConfig, StorageBackend, StorageConfig};
use todolist_shared::auth::jwt::{create_token, Claims};
use todolist_shared::auth::password::hash_password;
use todolist_shared::mail::{EmailJob, EmailKind};
use todolist_shared::models::{CreateUser, User, UserRole};
use todolist_shared::store::UserStore;

pub const TEST_PASSWORD: &str = "Str0ng@Pass";
pub const TEST_SECRET: &str = "integration-test-secret-that-is-long-enough";

/// Test context containing all necessary resources
pub struct TestContext {
    pub state: AppState,
    pub app: Router,
}

/// A user created directly in the store
pub struct TestUser {
    pub user: User,
    pub token: String,
}

impl TestUser {
    pub fn id(&self) -> Uuid {
        self.user.id
    }
}

/// Status, headers and JSON body of one response
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    pub fn message(&self) -> &str {
        self.body["message"].as_str().unwrap_or_default()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

pub fn test_config() -> Config {
    Config {
        api: ApiConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            cors_origins: vec!["*".to_string()],
            environment: "test".to_string(),
            production: false,
        },
        storage: StorageConfig {
            backend: StorageBackend::Memory,
            database_url: None,
            max_connections: 1,
        },
        jwt: JwtConfig {
            secret: TEST_SECRET.to_string(),
            expires_in_secs: 3600,
        },
        cache: CacheConfig {
            ttl_secs: 100,
            redis_url: None,
        },
        inline_email_worker: false,
    }
}

impl TestContext {
    /// Creates a fresh application with empty in-memory backends
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: Config) -> Self {
        let state = AppState::in_memory(config).expect("failed to build in-memory state");
        let app = build_router(state.clone());

        TestContext { state, app }
    }

    /// Inserts a verified-or-not account with [`TEST_PASSWORD`] and signs a token for it
    pub async fn create_user(&self, email: &str, role: UserRole) -> TestUser {
        let user = self
            .state
            .store
            .create_user(CreateUser {
                first_name: "Test".to_string(),
                last_name: "User".to_string(),
                email: email.to_string(),
                password_hash: hash_password(TEST_PASSWORD).expect("hash"),
                role,
            })
            .await
            .expect("create user");

        let claims = Claims::new(user.id, user.email.clone(), user.role);
        let token = create_token(&claims, TEST_SECRET).expect("token");

        TestUser { user, token }
    }

    pub async fn member(&self, email: &str) -> TestUser {
        self.create_user(email, UserRole::User).await
    }

    pub async fn admin(&self, email: &str) -> TestUser {
        self.create_user(email, UserRole::Admin).await
    }

    /// Sends one request through the full middleware stack
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }

        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request");

        self.dispatch(request).await
    }

    pub async fn dispatch(&self, request: Request<Body>) -> TestResponse {
        let response = self.app.clone().oneshot(request).await.expect("oneshot");

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");

        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };

        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.send(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> TestResponse {
        self.send(Method::POST, uri, token, Some(body)).await
    }

    pub async fn patch(&self, uri: &str, token: Option<&str>, body: Value) -> TestResponse {
        self.send(Method::PATCH, uri, token, Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: Option<&str>, body: Value) -> TestResponse {
        self.send(Method::PUT, uri, token, Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.send(Method::DELETE, uri, token, None).await
    }

    /// Creates a todo over HTTP and returns its JSON
    pub async fn create_todo(&self, token: &str, title: &str) -> Value {
        let response = self
            .post(
                "/api/v1/todo/create",
                Some(token),
                serde_json::json!({ "title": title }),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);
        response.body["data"].clone()
    }

    /// Next job waiting on the email queue, if any
    pub async fn next_email(&self) -> Option<EmailJob> {
        self.state
            .emails
            .dequeue(Duration::from_millis(10))
            .await
            .expect("dequeue")
    }

    /// Drains the queue and returns the code from the last OTP email
    pub async fn last_otp(&self) -> String {
        let mut otp = None;
        while let Some(job) = self.next_email().await {
            match job.kind {
                EmailKind::VerifyOtp { otp: code, .. } | EmailKind::ResetOtp { otp: code, .. } => {
                    otp = Some(code)
                }
                EmailKind::Welcome { .. } => {}
            }
        }
        otp.expect("no OTP email queued")
    }
}

/// Register payload that passes every validator
pub fn register_body(email: &str) -> Value {
    serde_json::json!({
        "firstName": "Ada",
        "lastName": "Lovelace",
        "email": email,
        "password": TEST_PASSWORD,
        "confirm_password": TEST_PASSWORD,
    })
}

/// Ids of the todos in a list response, in response order
pub fn ids(page: &Value) -> Vec<String> {
    page["data"]
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item["_id"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}
