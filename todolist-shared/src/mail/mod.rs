/// Outgoing email jobs
///
/// Request handlers describe an email as an [`EmailJob`] and hand it to an
/// [`EmailQueue`]; they never wait for delivery. The worker crate drains the
/// queue, renders the template for the job's [`EmailKind`] and sends it.
///
/// Two queue implementations:
///
/// - [`MemoryEmailQueue`]: tokio channel, consumer in the same process
/// - [`RedisEmailQueue`]: Redis list (`LPUSH`/`BRPOP`), consumer anywhere

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

pub mod memory;
pub mod redis;

pub use self::memory::MemoryEmailQueue;
pub use self::redis::RedisEmailQueue;

/// What to send
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EmailKind {
    /// Sent after registration
    Welcome { first_name: String },

    /// Account verification code
    VerifyOtp { name: String, otp: String },

    /// Password reset code
    ResetOtp { name: String, otp: String },
}

impl EmailKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmailKind::Welcome { .. } => "welcome",
            EmailKind::VerifyOtp { .. } => "verify_otp",
            EmailKind::ResetOtp { .. } => "reset_otp",
        }
    }
}

// Codes stay out of logs.
impl fmt::Debug for EmailKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmailKind::Welcome { first_name } => f
                .debug_struct("Welcome")
                .field("first_name", first_name)
                .finish(),
            EmailKind::VerifyOtp { name, .. } => f
                .debug_struct("VerifyOtp")
                .field("name", name)
                .field("otp", &"[REDACTED]")
                .finish(),
            EmailKind::ResetOtp { name, .. } => f
                .debug_struct("ResetOtp")
                .field("name", name)
                .field("otp", &"[REDACTED]")
                .finish(),
        }
    }
}

/// A queued email
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailJob {
    pub id: Uuid,

    /// Recipient address
    pub to: String,

    pub kind: EmailKind,

    pub created_at: DateTime<Utc>,
}

impl EmailJob {
    pub fn new(to: impl Into<String>, kind: EmailKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            to: to.into(),
            kind,
            created_at: Utc::now(),
        }
    }

    pub fn welcome(to: impl Into<String>, first_name: impl Into<String>) -> Self {
        Self::new(
            to,
            EmailKind::Welcome {
                first_name: first_name.into(),
            },
        )
    }

    pub fn verify_otp(to: impl Into<String>, name: impl Into<String>, otp: impl Into<String>) -> Self {
        Self::new(
            to,
            EmailKind::VerifyOtp {
                name: name.into(),
                otp: otp.into(),
            },
        )
    }

    pub fn reset_otp(to: impl Into<String>, name: impl Into<String>, otp: impl Into<String>) -> Self {
        Self::new(
            to,
            EmailKind::ResetOtp {
                name: name.into(),
                otp: otp.into(),
            },
        )
    }
}

/// Queue errors
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Email queue closed")]
    Closed,

    #[error("Redis error: {0}")]
    Redis(#[from] ::redis::RedisError),

    #[error("Malformed email job: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Producer/consumer handle for email jobs
#[async_trait]
pub trait EmailQueue: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    async fn enqueue(&self, job: EmailJob) -> Result<(), QueueError>;

    /// Waits up to `wait` for the next job
    async fn dequeue(&self, wait: Duration) -> Result<Option<EmailJob>, QueueError>;
}
