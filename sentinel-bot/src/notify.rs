//! Slack incoming-webhook notifier.
//!
//! Delivers a single text message to the configured channel, optionally
//! @-mentioning a resolved chat user. Delivery failure is an error for the
//! caller to log; it never aborts a pass.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde_json::json;
use tracing::info;

use crate::directory::ChatUserId;

/// Render the notification text: optional mention, message, then the link
/// on its own line.
pub fn format_message(mention: Option<&ChatUserId>, message: &str, link: &str) -> String {
    match mention {
        Some(id) => format!("<@{}> {}\n{}", id, message, link),
        None => format!("{}\n{}", message, link),
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver `message` to the chat channel, mentioning `mention` if given,
    /// with `link` appended on its own line.
    async fn post(&self, message: &str, mention: Option<&ChatUserId>, link: &str) -> Result<()>;
}

#[derive(Clone)]
pub struct SlackWebhook {
    client: reqwest::Client,
    webhook_url: String,
}

impl SlackWebhook {
    pub fn new(webhook_url: String) -> Self {
        let client = reqwest::Client::builder()
            .user_agent("sentinel/0.1.0")
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            webhook_url,
        }
    }
}

#[async_trait]
impl Notifier for SlackWebhook {
    async fn post(&self, message: &str, mention: Option<&ChatUserId>, link: &str) -> Result<()> {
        let text = format_message(mention, message, link);

        let response = self
            .client
            .post(&self.webhook_url)
            .json(&json!({ "text": text }))
            .send()
            .await
            .context("Failed to send Slack notification")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow!(
                "Slack webhook returned {status}: {error_text}"
            ));
        }

        info!("Notification sent to Slack");
        Ok(())
    }
}
