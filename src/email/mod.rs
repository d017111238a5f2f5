pub mod dispatch;

pub use dispatch::{send_notifications, EmailSendReport};

use crate::config::EmailConfig;
use crate::error::{ChurnError, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

/// Outbound delivery seam. The dispatcher only sees this trait, so the
/// HTTP provider can be swapped for the log transport (or a test double)
/// without touching the send loop.
#[async_trait]
pub trait EmailTransport: Send + Sync {
    async fn send(&self, to_email: &str, to_name: &str, issue: &str) -> Result<()>;
}

/// Subject and body template shared by every transport
fn render_subject(issue: &str) -> String {
    format!("Issue Notification: {}", issue)
}

fn render_body(to_name: &str, issue: &str) -> String {
    format!(
        "Dear {},\n\n\
         We wanted to inform you about the following issue:\n\n\
         Issue: {}\n\n\
         Please take the necessary action to resolve this matter.\n\n\
         Best regards,\n\
         Customer Support Team",
        to_name, issue
    )
}

/// JSON payload for the HTTP mail API
#[derive(Serialize)]
struct MailRequest {
    from: String,
    to: String,
    subject: String,
    text: String,
}

/// Mail client posting to a configurable HTTP mail-API endpoint.
pub struct HttpMailer {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    from_email: String,
}

impl HttpMailer {
    pub fn new(api_url: String, api_key: String, from_email: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            api_url,
            api_key,
            from_email,
        }
    }
}

#[async_trait]
impl EmailTransport for HttpMailer {
    async fn send(&self, to_email: &str, to_name: &str, issue: &str) -> Result<()> {
        let request = MailRequest {
            from: self.from_email.clone(),
            to: to_email.to_string(),
            subject: render_subject(issue),
            text: render_body(to_name, issue),
        };

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ChurnError::Email(format!("Failed to send email to {}: {}", to_email, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChurnError::Email(format!(
                "Mail API returned {} for {}: {}",
                status, to_email, body
            )));
        }

        Ok(())
    }
}

/// Development transport: logs the message instead of delivering it.
pub struct LogMailer;

#[async_trait]
impl EmailTransport for LogMailer {
    async fn send(&self, to_email: &str, to_name: &str, issue: &str) -> Result<()> {
        log::info!(
            "EMAIL SIMULATION - To: {}, Subject: {}",
            to_email,
            render_subject(issue)
        );
        log::debug!("EMAIL BODY: {}", render_body(to_name, issue));
        Ok(())
    }
}

/// Build the transport the configuration asks for.
pub fn build_transport(config: &EmailConfig) -> Result<Box<dyn EmailTransport>> {
    if !config.enabled {
        log::info!("Email delivery disabled, using log transport");
        return Ok(Box::new(LogMailer));
    }

    let api_key = std::env::var(&config.api_key_env).map_err(|_| {
        ChurnError::Config(format!(
            "Environment variable {} not set. Set it in your .env file or disable email.enabled.",
            config.api_key_env
        ))
    })?;

    Ok(Box::new(HttpMailer::new(
        config.api_url.clone(),
        api_key,
        config.from_email.clone(),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_templates() {
        assert_eq!(render_subject("Slow line"), "Issue Notification: Slow line");
        let body = render_body("Amal", "Slow line");
        assert!(body.starts_with("Dear Amal,"));
        assert!(body.contains("Issue: Slow line"));
    }

    #[tokio::test]
    async fn test_log_mailer_always_succeeds() {
        let result = LogMailer.send("a@example.com", "Amal", "Wifi outage").await;
        assert!(result.is_ok());
    }
}
