//! Outbound email for attendance notifications.
//!
//! Providers:
//! - `console`: logs the message (development)
//! - `sendgrid`: SendGrid v3 mail API

use crate::config::EmailConfig;
use async_trait::async_trait;
use domain::services::{EmailMessage, Mailer, NotificationError};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, error, info};

const SENDGRID_ENDPOINT: &str = "https://api.sendgrid.com/v3/mail/send";

/// Email service backed by the configured provider.
#[derive(Clone)]
pub struct EmailService {
    config: Arc<EmailConfig>,
    client: reqwest::Client,
}

impl EmailService {
    pub fn new(config: EmailConfig) -> Self {
        Self {
            config: Arc::new(config),
            client: reqwest::Client::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Drops the HTML alternative unless the html template style is configured.
    fn prepare(&self, mut message: EmailMessage) -> EmailMessage {
        if self.config.template_style != "html" {
            message.body_html = None;
        }
        message
    }

    async fn send_console(&self, message: EmailMessage) -> Result<(), NotificationError> {
        info!(
            to = %message.to,
            to_name = ?message.to_name,
            subject = %message.subject,
            from = %self.config.sender_email,
            from_name = %self.config.sender_name,
            "Email (console provider)"
        );
        info!(body_text = %message.body_text, "Email body (plain text)");
        if let Some(html) = &message.body_html {
            debug!(body_html_length = html.len(), "Email body (HTML)");
        }
        Ok(())
    }

    async fn send_sendgrid(&self, message: EmailMessage) -> Result<(), NotificationError> {
        if self.config.sendgrid_api_key.is_empty() {
            return Err(NotificationError::NotConfigured);
        }

        let body = sendgrid_payload(&self.config, &message);

        let response = self
            .client
            .post(SENDGRID_ENDPOINT)
            .bearer_auth(&self.config.sendgrid_api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| NotificationError::SendFailed(format!("SendGrid request failed: {}", e)))?;

        if response.status().is_success() {
            info!(to = %message.to, subject = %message.subject, "Email sent via SendGrid");
            Ok(())
        } else {
            let status = response.status();
            let error_body = response.text().await.unwrap_or_default();
            error!(status = %status, error = %error_body, "SendGrid API error");
            Err(NotificationError::ProviderError(format!(
                "SendGrid returned {}: {}",
                status, error_body
            )))
        }
    }
}

#[async_trait]
impl Mailer for EmailService {
    async fn send(&self, message: EmailMessage) -> Result<(), NotificationError> {
        if !self.config.enabled {
            debug!(
                to = %message.to,
                subject = %message.subject,
                "Email service disabled, skipping send"
            );
            return Ok(());
        }

        let message = self.prepare(message);
        match self.config.provider.as_str() {
            "console" => self.send_console(message).await,
            "sendgrid" => self.send_sendgrid(message).await,
            provider => {
                error!(provider = %provider, "Unknown email provider");
                Err(NotificationError::NotConfigured)
            }
        }
    }
}

fn sendgrid_payload(config: &EmailConfig, message: &EmailMessage) -> Value {
    let mut recipient = json!({ "email": message.to });
    if let Some(name) = &message.to_name {
        recipient["name"] = json!(name);
    }

    let mut content = vec![json!({ "type": "text/plain", "value": message.body_text })];
    if let Some(html) = &message.body_html {
        content.push(json!({ "type": "text/html", "value": html }));
    }

    json!({
        "personalizations": [{ "to": [recipient] }],
        "from": {
            "email": config.sender_email,
            "name": config.sender_name
        },
        "subject": message.subject,
        "content": content
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(provider: &str) -> EmailConfig {
        EmailConfig {
            enabled: true,
            provider: provider.to_string(),
            ..EmailConfig::default()
        }
    }

    fn message() -> EmailMessage {
        EmailMessage {
            to: "jane@example.com".to_string(),
            to_name: Some("Jane Doe".to_string()),
            subject: "Your booking".to_string(),
            body_text: "See you soon".to_string(),
            body_html: Some("<p>See you soon</p>".to_string()),
        }
    }

    #[tokio::test]
    async fn test_disabled_service_skips_send() {
        let service = EmailService::new(EmailConfig::default());
        assert!(!service.is_enabled());
        assert!(service.send(message()).await.is_ok());
    }

    #[tokio::test]
    async fn test_console_provider() {
        let service = EmailService::new(config("console"));
        assert!(service.send(message()).await.is_ok());
    }

    #[tokio::test]
    async fn test_sendgrid_without_key_is_not_configured() {
        let service = EmailService::new(config("sendgrid"));
        let result = service.send(message()).await;
        assert!(matches!(result, Err(NotificationError::NotConfigured)));
    }

    #[tokio::test]
    async fn test_unknown_provider() {
        let service = EmailService::new(config("carrier-pigeon"));
        assert!(matches!(
            service.send(message()).await,
            Err(NotificationError::NotConfigured)
        ));
    }

    #[test]
    fn test_plain_template_drops_html() {
        let mut cfg = config("console");
        cfg.template_style = "plain".to_string();
        let prepared = EmailService::new(cfg).prepare(message());
        assert!(prepared.body_html.is_none());

        let prepared = EmailService::new(config("console")).prepare(message());
        assert!(prepared.body_html.is_some());
    }

    #[test]
    fn test_sendgrid_payload() {
        let payload = sendgrid_payload(&config("sendgrid"), &message());
        assert_eq!(payload["personalizations"][0]["to"][0]["email"], "jane@example.com");
        assert_eq!(payload["personalizations"][0]["to"][0]["name"], "Jane Doe");
        assert_eq!(payload["from"]["name"], "Atelier");
        assert_eq!(payload["content"][0]["type"], "text/plain");
        assert_eq!(payload["content"][1]["type"], "text/html");
    }

    #[test]
    fn test_sendgrid_payload_without_name_or_html() {
        let mut msg = message();
        msg.to_name = None;
        msg.body_html = None;
        let payload = sendgrid_payload(&config("sendgrid"), &msg);
        assert!(payload["personalizations"][0]["to"][0].get("name").is_none());
        assert_eq!(payload["content"].as_array().map(Vec::len), Some(1));
    }
}
