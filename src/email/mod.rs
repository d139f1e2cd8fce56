//! Outbound delivery of magic link emails.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{EmailConfig, EmailProvider};

#[derive(Debug, Clone, Serialize)]
pub struct MagicLinkEmail {
    pub to: String,
    pub url: String,
    pub survey_title: String,
}

impl MagicLinkEmail {
    pub fn subject(&self) -> String {
        format!("Your link to \"{}\"", self.survey_title)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    #[error("Email delivery failed: {0}")]
    DeliveryFailed(String),
}

#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, email: &MagicLinkEmail) -> Result<(), EmailError>;
}

/// Writes the message to the log instead of sending it. Development only.
#[derive(Debug, Default)]
pub struct LogEmailSender;

#[async_trait]
impl EmailSender for LogEmailSender {
    async fn send(&self, email: &MagicLinkEmail) -> Result<(), EmailError> {
        tracing::info!(to = %email.to, subject = %email.subject(), url = %email.url, "magic link email (log provider)");
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    from: &'a str,
    to: &'a str,
    subject: String,
    text: String,
}

/// POSTs the message as JSON to a transactional email webhook
pub struct WebhookEmailSender {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
    from: String,
}

impl WebhookEmailSender {
    pub fn new(url: String, api_key: Option<String>, from: String, timeout: Duration) -> Result<Self, EmailError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EmailError::DeliveryFailed(e.to_string()))?;
        Ok(Self {
            client,
            url,
            api_key,
            from,
        })
    }
}

#[async_trait]
impl EmailSender for WebhookEmailSender {
    async fn send(&self, email: &MagicLinkEmail) -> Result<(), EmailError> {
        let payload = WebhookPayload {
            from: &self.from,
            to: &email.to,
            subject: email.subject(),
            text: format!(
                "Follow this link to open \"{}\":\n\n{}\n\nThe link works once.",
                email.survey_title, email.url
            ),
        };

        let mut request = self.client.post(&self.url).json(&payload);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| EmailError::DeliveryFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(EmailError::DeliveryFailed(format!("provider returned {}", response.status())));
        }
        Ok(())
    }
}

pub fn build_mailer(config: &EmailConfig) -> Result<Arc<dyn EmailSender>, EmailError> {
    match config.provider {
        EmailProvider::Log => Ok(Arc::new(LogEmailSender)),
        EmailProvider::Webhook => {
            let url = config
                .webhook_url
                .clone()
                .ok_or_else(|| EmailError::DeliveryFailed("email.webhook_url is not set".into()))?;
            let sender = WebhookEmailSender::new(
                url,
                config.api_key.clone(),
                config.from_address.clone(),
                Duration::from_secs(config.timeout_secs),
            )?;
            Ok(Arc::new(sender))
        }
    }
}
