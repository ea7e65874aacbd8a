//! Operator email, delivered through an HTTP mail API.
//!
//! Used exclusively for out-of-band error reporting: summarizer failures
//! and uncaught pass-level failures. Delivery is best-effort; a failed send
//! is logged by the caller and nothing more.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use tracing::info;

#[async_trait]
pub trait MailSender: Send + Sync {
    async fn send(&self, subject: &str, body: &str, to: &str) -> Result<()>;
}

#[derive(Debug, Serialize)]
struct MailRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
}

/// Mail client posting JSON to a Resend-style transactional mail endpoint.
#[derive(Clone)]
pub struct HttpMailer {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    from: String,
}

impl HttpMailer {
    pub fn new(endpoint: String, api_key: String, from: String) -> Self {
        let client = reqwest::Client::builder()
            .user_agent("sentinel/0.1.0")
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            endpoint,
            api_key,
            from,
        }
    }
}

#[async_trait]
impl MailSender for HttpMailer {
    async fn send(&self, subject: &str, body: &str, to: &str) -> Result<()> {
        let request = MailRequest {
            from: &self.from,
            to,
            subject,
            text: body,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .context("Failed to send operator email")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow!("Mail API returned {status}: {error_text}"));
        }

        info!("Operator email sent: {subject}");
        Ok(())
    }
}
