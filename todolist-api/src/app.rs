/// Application state and router builder
///
/// This module defines the shared application state and provides
/// a function to build the Axum router with all routes and middleware.
///
/// # Example
///
/// ```no_run
/// use todolist_api::{app::{build_router, AppState}, config::Config};
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let state = AppState::in_memory(config)?;
/// let app = build_router(state);
///
/// let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
/// axum::serve(listener, app).await?;
/// # Ok(())
/// # }
/// ```

use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, patch, post, put},
    Router,
};
use metrics_exporter_prometheus::{BuildError, PrometheusHandle};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use todolist_shared::active_users::{ActiveUsers, ACTIVE_WINDOW};
use todolist_shared::cache::CacheService;
use todolist_shared::mail::{EmailJob, EmailQueue, MemoryEmailQueue};
use todolist_shared::store::{MemoryStore, Store};

use crate::config::Config;
use crate::metrics;
use crate::middleware::{
    debug_detail, policy, request_log, security::SecurityHeadersLayer, session,
};
use crate::routes;

/// Shared application state
///
/// This is cloned for each request handler via Axum's `State` extractor.
/// Every field is reference counted, so clones are shallow.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,

    pub cache: CacheService,

    /// Users seen in the last five minutes
    pub active_users: Arc<ActiveUsers>,

    /// Producer side of the email queue
    pub emails: Arc<dyn EmailQueue>,

    pub metrics: PrometheusHandle,

    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn Store>,
        cache: CacheService,
        emails: Arc<dyn EmailQueue>,
        metrics: PrometheusHandle,
        config: Config,
    ) -> Self {
        Self {
            store,
            cache,
            active_users: Arc::new(ActiveUsers::new(ACTIVE_WINDOW)),
            emails,
            metrics,
            config: Arc::new(config),
        }
    }

    /// State backed entirely by process memory
    ///
    /// Used by the `memory` storage backend and by the integration tests.
    pub fn in_memory(config: Config) -> Result<Self, BuildError> {
        let handle = metrics::install(&config.api.environment)?;
        let cache = CacheService::in_memory(config.cache.ttl());

        Ok(Self::new(
            Arc::new(MemoryStore::new()),
            cache,
            Arc::new(MemoryEmailQueue::new()),
            handle,
            config,
        ))
    }

    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }

    /// Queues an email without waiting for delivery
    ///
    /// A queue failure is logged and swallowed; the request that triggered
    /// the email still succeeds.
    pub async fn enqueue_email(&self, job: EmailJob) {
        let job_id = job.id;
        let kind = job.kind.as_str();

        match self.emails.enqueue(job).await {
            Ok(()) => tracing::debug!(job_id = %job_id, kind, "Email job queued"),
            Err(e) => tracing::error!(job_id = %job_id, kind, error = %e, "Failed to queue email job"),
        }
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Routes
///
/// ```text
/// GET    /                                       # Liveness text
/// GET    /health                                 # Store and cache status
/// GET    /metrics, /api/metrics                  # Prometheus exposition
/// POST   /api/v1/auth/users/register
/// POST   /api/v1/auth/users/login
/// POST   /api/v1/auth/users/logout
/// POST   /api/v1/auth/users/send-otp-verify      # authenticated
/// POST   /api/v1/auth/users/verify-otp           # authenticated
/// POST   /api/v1/auth/users/send-reset-password
/// POST   /api/v1/auth/users/reset-password
/// GET    /api/v1/users                           # admin
/// GET    /api/v1/users/current
/// GET    /api/v1/users/:id
/// PUT    /api/v1/users/update/:id                # self
/// DELETE /api/v1/users/delete/:id                # self or admin
/// GET    /api/v1/todo/user/:id                   # self or admin
/// GET    /api/v1/todo/:id
/// POST   /api/v1/todo/create
/// PATCH  /api/v1/todo/update/:id
/// PATCH  /api/v1/todo/reorder
/// DELETE /api/v1/todo/delete/:id                 # owner or admin
/// DELETE /api/v1/todo/delete/:id/clear-completed
/// ```
///
/// Guards come from [`policy::ROUTE_POLICIES`], not from the route list.
///
/// # Middleware Stack
///
/// Outermost first: security headers, CORS, compression, tracing span,
/// request log, 500 debug detail, session resolution, then the policy check
/// on matched routes.
pub fn build_router(state: AppState) -> Router {
    use crate::routes::{auth, health, todos, users};

    let api = Router::new()
        // Auth
        .route("/api/v1/auth/users/register", post(auth::register))
        .route("/api/v1/auth/users/login", post(auth::login))
        .route("/api/v1/auth/users/logout", post(auth::logout))
        .route("/api/v1/auth/users/send-otp-verify", post(auth::send_verify_otp))
        .route("/api/v1/auth/users/verify-otp", post(auth::verify_email))
        .route("/api/v1/auth/users/send-reset-password", post(auth::send_reset_otp))
        .route("/api/v1/auth/users/reset-password", post(auth::reset_password))
        // Users
        .route("/api/v1/users", get(users::list_users))
        .route("/api/v1/users/current", get(users::current_user))
        .route("/api/v1/users/:id", get(users::get_user))
        .route("/api/v1/users/update/:id", put(users::update_profile))
        .route("/api/v1/users/delete/:id", delete(users::delete_account))
        // Todos
        .route("/api/v1/todo/user/:id", get(todos::list_todos))
        .route("/api/v1/todo/:id", get(todos::get_todo))
        .route("/api/v1/todo/create", post(todos::create_todo))
        .route("/api/v1/todo/update/:id", patch(todos::update_todo))
        .route("/api/v1/todo/reorder", patch(todos::reorder_todos))
        .route("/api/v1/todo/delete/:id", delete(todos::delete_todo))
        .route(
            "/api/v1/todo/delete/:id/clear-completed",
            delete(todos::clear_completed),
        );

    let cors = cors_layer(&state.config.api.cors_origins);

    Router::new()
        .route("/", get(health::root))
        .route("/health", get(health::health_check))
        .route("/metrics", get(routes::metrics::render))
        .route("/api/metrics", get(routes::metrics::render))
        .merge(api)
        .route_layer(from_fn_with_state(state.clone(), policy::enforce))
        .fallback(routes::not_found)
        .layer(from_fn_with_state(state.clone(), session::resolve))
        .layer(from_fn_with_state(state.clone(), debug_detail::expose))
        .layer(from_fn(request_log::log_request))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::DEBUG)),
        )
        .layer(CompressionLayer::new())
        .layer(cors)
        .layer(SecurityHeadersLayer::new(state.config.api.production))
        .with_state(state)
}

/// `*` mirrors any origin; otherwise only the listed origins are allowed.
/// Credentials are allowed either way so the session cookie travels.
fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|origin| origin == "*") {
        return CorsLayer::very_permissive();
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    let request_id = HeaderName::from_static(request_log::REQUEST_ID_HEADER);

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, request_id.clone()])
        .expose_headers([request_id])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600))
}
