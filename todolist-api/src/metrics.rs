//! Prometheus metrics through the `metrics` facade.
//!
//! ## Metric Names
//!
//! - `http_requests_total{method,route,status_code}`
//! - `http_request_duration_seconds{method,route,status_code}`
//! - `http_requests_errors_total{method,route}` (status >= 400)
//! - `http_requests_5xx_total{method,route}`
//! - `app_up`, `active_users`, `db_up` (gauges)
//! - `db_ping_latency_ms` (histogram)
//!
//! Every series carries `service="todo-backend"` and `env`.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::app::AppState;

const HTTP_REQUESTS_TOTAL: &str = "http_requests_total";
const HTTP_REQUEST_DURATION: &str = "http_request_duration_seconds";
const HTTP_ERRORS_TOTAL: &str = "http_requests_errors_total";
const HTTP_5XX_TOTAL: &str = "http_requests_5xx_total";
const APP_UP: &str = "app_up";
const ACTIVE_USERS: &str = "active_users";
const DB_UP: &str = "db_up";
const DB_PING_LATENCY: &str = "db_ping_latency_ms";

pub const SERVICE_NAME: &str = "todo-backend";

const HTTP_DURATION_BUCKETS: &[f64] = &[0.1, 0.3, 0.5, 1.0, 2.0, 5.0];
const DB_PING_BUCKETS: &[f64] = &[5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0];

/// How often the system probe refreshes the gauges
pub const PROBE_INTERVAL: Duration = Duration::from_secs(5);

// A process has one global recorder; later callers share its handle.
static HANDLE: Mutex<Option<PrometheusHandle>> = Mutex::new(None);

/// Installs the global Prometheus recorder, or returns the installed one
pub fn install(environment: &str) -> Result<PrometheusHandle, BuildError> {
    let mut slot = HANDLE.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

    if let Some(handle) = slot.as_ref() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new()
        .add_global_label("service", SERVICE_NAME)
        .add_global_label("env", environment)
        .set_buckets_for_metric(
            Matcher::Full(HTTP_REQUEST_DURATION.to_string()),
            HTTP_DURATION_BUCKETS,
        )?
        .set_buckets_for_metric(Matcher::Full(DB_PING_LATENCY.to_string()), DB_PING_BUCKETS)?
        .install_recorder()?;

    tracing::info!(env = environment, "Prometheus recorder installed");
    *slot = Some(handle.clone());
    Ok(handle)
}

/// Records one finished HTTP request
pub fn record_request(method: &str, route: &str, status: u16, elapsed: Duration) {
    let status_code = status.to_string();

    counter!(HTTP_REQUESTS_TOTAL,
        "method" => method.to_string(),
        "route" => route.to_string(),
        "status_code" => status_code.clone()
    )
    .increment(1);

    histogram!(HTTP_REQUEST_DURATION,
        "method" => method.to_string(),
        "route" => route.to_string(),
        "status_code" => status_code
    )
    .record(elapsed.as_secs_f64());

    if status >= 400 {
        counter!(HTTP_ERRORS_TOTAL, "method" => method.to_string(), "route" => route.to_string())
            .increment(1);
    }

    if status >= 500 {
        counter!(HTTP_5XX_TOTAL, "method" => method.to_string(), "route" => route.to_string())
            .increment(1);
    }
}

pub fn set_app_up(up: bool) {
    gauge!(APP_UP).set(if up { 1.0 } else { 0.0 });
}

pub fn set_active_users(count: usize) {
    gauge!(ACTIVE_USERS).set(count as f64);
}

pub fn set_db_up(up: bool) {
    gauge!(DB_UP).set(if up { 1.0 } else { 0.0 });
}

pub fn record_db_ping(latency: Duration) {
    histogram!(DB_PING_LATENCY).record(latency.as_secs_f64() * 1000.0);
}

/// One refresh of the system gauges
pub async fn probe(state: &AppState) {
    set_app_up(true);
    set_active_users(state.active_users.count_active());

    let started = Instant::now();
    match state.store.ping().await {
        Ok(()) => {
            set_db_up(true);
            record_db_ping(started.elapsed());
        }
        Err(e) => {
            tracing::warn!(error = %e, backend = state.store.backend(), "Store ping failed");
            set_db_up(false);
        }
    }
}

/// Runs [`probe`] every [`PROBE_INTERVAL`] until `shutdown` fires
pub fn spawn_system_probe(state: AppState, shutdown: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(PROBE_INTERVAL);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => probe(&state).await,
            }
        }

        set_app_up(false);
        tracing::debug!("System metrics probe stopped");
    })
}
