/// Email transports
///
/// [`BrevoMailer`] posts to the Brevo transactional email API.
/// [`LogMailer`] only logs, and is used when no API key is configured.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::config::WorkerConfig;
use crate::templates::RenderedEmail;

pub const BREVO_ENDPOINT: &str = "https://api.brevo.com/v3/smtp/email";

/// Mailer error types
#[derive(Debug, thiserror::Error)]
pub enum MailerError {
    /// Request never got a response
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Provider answered with a non-success status
    #[error("Provider rejected email with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

#[async_trait]
pub trait Mailer: Send + Sync {
    fn name(&self) -> &'static str;

    async fn send(&self, email: &RenderedEmail) -> Result<(), MailerError>;
}

#[derive(Serialize)]
struct Contact<'a> {
    email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SendSmtpEmail<'a> {
    sender: Contact<'a>,
    to: Vec<Contact<'a>>,
    subject: &'a str,
    html_content: &'a str,
}

pub struct BrevoMailer {
    client: Client,
    endpoint: String,
    api_key: String,
    sender_address: String,
    sender_name: String,
}

impl BrevoMailer {
    pub fn new(
        api_key: impl Into<String>,
        sender_address: impl Into<String>,
        sender_name: impl Into<String>,
    ) -> Result<Self, MailerError> {
        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;

        Ok(Self {
            client,
            endpoint: BREVO_ENDPOINT.to_string(),
            api_key: api_key.into(),
            sender_address: sender_address.into(),
            sender_name: sender_name.into(),
        })
    }

    /// Points the mailer at another endpoint (for a local mock server)
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn payload<'a>(&'a self, email: &'a RenderedEmail) -> SendSmtpEmail<'a> {
        SendSmtpEmail {
            sender: Contact {
                email: &self.sender_address,
                name: Some(&self.sender_name),
            },
            to: vec![Contact {
                email: &email.to,
                name: None,
            }],
            subject: &email.subject,
            html_content: &email.html,
        }
    }
}

#[async_trait]
impl Mailer for BrevoMailer {
    fn name(&self) -> &'static str {
        "brevo"
    }

    async fn send(&self, email: &RenderedEmail) -> Result<(), MailerError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("api-key", &self.api_key)
            .header("accept", "application/json")
            .json(&self.payload(email))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| status.to_string());
            return Err(MailerError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        tracing::debug!(to = %email.to, subject = %email.subject, "Email accepted by Brevo");
        Ok(())
    }
}

/// Logs instead of sending
#[derive(Debug, Default, Clone)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn send(&self, email: &RenderedEmail) -> Result<(), MailerError> {
        tracing::info!(
            to = %email.to,
            subject = %email.subject,
            "Email delivery disabled, message dropped"
        );
        Ok(())
    }
}

/// Brevo when an API key is configured, otherwise [`LogMailer`]
pub fn from_config(config: &WorkerConfig) -> Result<Arc<dyn Mailer>, MailerError> {
    match &config.brevo_api_key {
        Some(key) => Ok(Arc::new(BrevoMailer::new(
            key.clone(),
            config.sender_address.clone(),
            config.sender_name.clone(),
        )?)),
        None => {
            tracing::warn!("BREVO_API_KEY missing, emails will only be logged");
            Ok(Arc::new(LogMailer))
        }
    }
}
