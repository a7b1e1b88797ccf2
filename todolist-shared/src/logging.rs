/// Tracing setup and log redaction
///
/// Both binaries call [`init_tracing`] once at startup and hold the returned
/// [`LogGuard`] until they exit. `RUST_LOG` overrides the per-binary default
/// filter.
///
/// # Outputs
///
/// - Daily files `LOG_DIR/todo.YYYY-MM-DD.log` (default `logs/`), one JSON
///   object per line, the last 14 days kept. An empty `LOG_DIR` turns files off.
/// - The console, except when `APP_ENV=production` and files are on.
///   `LOG_FORMAT=json` switches it to JSON.
///
/// Anything user-supplied that ends up in a log line goes through
/// [`redact`] (JSON bodies) or [`redact_header`] (header values) first.

use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::Subscriber;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Replacement written in place of a sensitive value
pub const REDACTED: &str = "[REDACTED]";

/// Keys whose values never reach the logs, compared case-insensitively
pub const SENSITIVE_KEYS: &[&str] = &[
    "password",
    "confirm_password",
    "confirmpassword",
    "newpassword",
    "token",
    "accesstoken",
    "authorization",
    "cookie",
    "set-cookie",
    "api_key",
    "otp",
];

pub const DEFAULT_LOG_DIR: &str = "logs";
pub const LOG_FILE_PREFIX: &str = "todo";
pub const LOG_RETENTION_DAYS: usize = 14;

/// Flushes buffered file output when dropped
#[must_use = "file logging stops when the guard is dropped"]
pub struct LogGuard {
    _file: Option<WorkerGuard>,
}

/// Initializes the global subscriber
///
/// Returns quietly if a subscriber is already installed. A log directory that
/// cannot be created falls back to console-only output with a warning.
pub fn init_tracing(default_filter: &str) -> LogGuard {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let production = std::env::var("APP_ENV")
        .map(|v| v.eq_ignore_ascii_case("production"))
        .unwrap_or(false);

    let (file, file_error) = match log_dir() {
        Some(dir) => match file_writer(&dir) {
            Ok((writer, guard)) => (Some((file_layer(writer), guard)), None),
            Err(e) => (None, Some((dir, e))),
        },
        None => (None, None),
    };
    let (file_output, guard) = match file {
        Some((layer, guard)) => (Some(layer), Some(guard)),
        None => (None, None),
    };

    let console = !production || file_output.is_none();
    let console_json = (console && json).then(|| fmt::layer().json());
    let console_text = (console && !json).then(fmt::layer);

    let result = tracing_subscriber::registry()
        .with(filter)
        .with(file_output)
        .with(console_json)
        .with(console_text)
        .try_init();

    if result.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
    if let Some((dir, e)) = file_error {
        tracing::warn!(dir = %dir.display(), error = %e, "Log directory unusable, logging to console only");
    }

    LogGuard { _file: guard }
}

fn log_dir() -> Option<PathBuf> {
    match std::env::var("LOG_DIR") {
        Ok(dir) if dir.trim().is_empty() => None,
        Ok(dir) => Some(PathBuf::from(dir)),
        Err(_) => Some(PathBuf::from(DEFAULT_LOG_DIR)),
    }
}

/// Non-blocking writer over the daily-rotated log files in `dir`
pub fn file_writer(dir: &Path) -> Result<(NonBlocking, WorkerGuard), InitError> {
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix("log")
        .max_log_files(LOG_RETENTION_DAYS)
        .build(dir)?;

    Ok(tracing_appender::non_blocking(appender))
}

/// JSON lines without ANSI colors, for files
pub fn file_layer<S>(writer: NonBlocking) -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fmt::layer().json().with_ansi(false).with_writer(writer)
}

pub fn is_sensitive(key: &str) -> bool {
    SENSITIVE_KEYS.iter().any(|k| k.eq_ignore_ascii_case(key))
}

/// Copy of `value` with every sensitive key's value replaced, at any depth
pub fn redact(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, inner)| {
                    let inner = if is_sensitive(key) {
                        Value::String(REDACTED.to_string())
                    } else {
                        redact(inner)
                    };
                    (key.clone(), inner)
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(redact).collect()),
        other => other.clone(),
    }
}

/// Header value as it may appear in a log line
pub fn redact_header<'a>(name: &str, value: &'a str) -> &'a str {
    if is_sensitive(name) {
        REDACTED
    } else {
        value
    }
}
