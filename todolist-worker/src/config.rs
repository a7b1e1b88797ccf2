/// Configuration for the email worker
///
/// # Environment Variables
///
/// - `REDIS_URL`: Queue location; required by the standalone worker binary
/// - `BREVO_API_KEY`: Brevo API key; without it emails are only logged
/// - `EMAIL_SENDER_ADDRESS`: From address (must be verified with Brevo)
/// - `EMAIL_SENDER_NAME`: From name (default: To Do App)
/// - `EMAIL_MAX_ATTEMPTS`: Delivery attempts per job (default: 3)
/// - `EMAIL_BACKOFF_MS`: First retry delay, doubled each retry (default: 5000)
/// - `EMAIL_POLL_SECS`: How long one dequeue waits for a job (default: 5)

use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

pub const DEFAULT_SENDER_ADDRESS: &str = "no-reply@todolist.local";
pub const DEFAULT_SENDER_NAME: &str = "To Do App";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    pub redis_url: Option<String>,

    /// Never logged
    #[serde(skip_serializing)]
    pub brevo_api_key: Option<String>,

    pub sender_address: String,

    pub sender_name: String,

    pub retry: RetryPolicy,

    pub poll_wait_secs: u64,
}

/// Exponential retry schedule for one job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff_ms: 5000,
        }
    }
}

impl RetryPolicy {
    /// Delay before retrying after failed attempt `attempt` (1-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(16);
        Duration::from_millis(self.base_backoff_ms.saturating_mul(factor))
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            brevo_api_key: None,
            sender_address: DEFAULT_SENDER_ADDRESS.to_string(),
            sender_name: DEFAULT_SENDER_NAME.to_string(),
            retry: RetryPolicy::default(),
            poll_wait_secs: 5,
        }
    }
}

impl WorkerConfig {
    /// Loads configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();

        let max_attempts = env::var("EMAIL_MAX_ATTEMPTS")
            .unwrap_or_else(|_| defaults.retry.max_attempts.to_string())
            .parse::<u32>()?;

        if max_attempts == 0 {
            anyhow::bail!("EMAIL_MAX_ATTEMPTS must be at least 1");
        }

        let base_backoff_ms = env::var("EMAIL_BACKOFF_MS")
            .unwrap_or_else(|_| defaults.retry.base_backoff_ms.to_string())
            .parse::<u64>()?;

        let poll_wait_secs = env::var("EMAIL_POLL_SECS")
            .unwrap_or_else(|_| defaults.poll_wait_secs.to_string())
            .parse::<u64>()?;

        Ok(Self {
            redis_url: non_empty_var("REDIS_URL"),
            brevo_api_key: non_empty_var("BREVO_API_KEY"),
            sender_address: non_empty_var("EMAIL_SENDER_ADDRESS").unwrap_or(defaults.sender_address),
            sender_name: non_empty_var("EMAIL_SENDER_NAME").unwrap_or(defaults.sender_name),
            retry: RetryPolicy {
                max_attempts,
                base_backoff_ms,
            },
            poll_wait_secs: poll_wait_secs.max(1),
        })
    }

    pub fn poll_wait(&self) -> Duration {
        Duration::from_secs(self.poll_wait_secs)
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}
