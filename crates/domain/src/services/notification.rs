//! Outbound email abstraction.
//!
//! The attendance engine only depends on [`Mailer`]; the api crate provides
//! the provider-backed implementation.

use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Email message to be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    /// Recipient email address
    pub to: String,
    /// Recipient name (optional)
    pub to_name: Option<String>,
    pub subject: String,
    /// Plain text body
    pub body_text: String,
    /// HTML body (optional)
    pub body_html: Option<String>,
}

/// Errors that can occur while delivering an email.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotificationError {
    #[error("Email service not configured")]
    NotConfigured,

    #[error("Failed to send email: {0}")]
    SendFailed(String),

    #[error("Provider error: {0}")]
    ProviderError(String),
}

/// Sends transactional emails.
#[async_trait::async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: EmailMessage) -> Result<(), NotificationError>;
}

/// Mock mailer for development and testing.
///
/// Records every message instead of delivering it.
#[derive(Debug, Clone, Default)]
pub struct MockMailer {
    sent: Arc<Mutex<Vec<EmailMessage>>>,
    /// Whether to simulate failures for testing.
    pub simulate_failure: bool,
}

impl MockMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock mailer whose sends always fail.
    pub fn failing() -> Self {
        Self {
            simulate_failure: true,
            ..Self::default()
        }
    }

    /// Messages accepted so far, oldest first.
    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }

    /// Messages accepted for a recipient.
    pub fn sent_to(&self, email: &str) -> Vec<EmailMessage> {
        self.sent()
            .into_iter()
            .filter(|message| message.to == email)
            .collect()
    }
}

#[async_trait::async_trait]
impl Mailer for MockMailer {
    async fn send(&self, message: EmailMessage) -> Result<(), NotificationError> {
        if self.simulate_failure {
            tracing::warn!(
                to = %message.to,
                subject = %message.subject,
                "Mock mailer simulating failure"
            );
            return Err(NotificationError::SendFailed("Simulated failure".to_string()));
        }

        tracing::info!(
            to = %message.to,
            subject = %message.subject,
            "Mock: Would send email"
        );
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(message);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(to: &str) -> EmailMessage {
        EmailMessage {
            to: to.to_string(),
            to_name: None,
            subject: "Subject".to_string(),
            body_text: "Body".to_string(),
            body_html: None,
        }
    }

    #[tokio::test]
    async fn test_mock_mailer_records_messages() {
        let mailer = MockMailer::new();
        mailer.send(message("a@example.com")).await.unwrap();
        mailer.send(message("b@example.com")).await.unwrap();

        assert_eq!(mailer.sent().len(), 2);
        assert_eq!(mailer.sent_to("b@example.com").len(), 1);
    }

    #[tokio::test]
    async fn test_clones_share_the_outbox() {
        let mailer = MockMailer::new();
        let clone = mailer.clone();
        clone.send(message("a@example.com")).await.unwrap();
        assert_eq!(mailer.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_failing_mailer() {
        let mailer = MockMailer::failing();
        let result = mailer.send(message("a@example.com")).await;
        assert_eq!(
            result,
            Err(NotificationError::SendFailed("Simulated failure".to_string()))
        );
        assert!(mailer.sent().is_empty());
    }
}
