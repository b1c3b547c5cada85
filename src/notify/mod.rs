//! Outbound report delivery.
//!
//! Delivery is one all-or-nothing call covering the whole batch. The trait
//! exists so the dispatch engine can be exercised against a mock sender;
//! the production implementation posts a raw MIME message to the Gmail
//! send endpoint.

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use serde::Deserialize;

/// Single-call report delivery
#[async_trait]
pub trait ReportSender: Send + Sync {
    /// Deliver one report. Success means the whole batch was delivered;
    /// there is no partial-success state.
    async fn send(&self, subject: &str, markdown_body: &str) -> Result<()>;
}

/// Gmail API sender configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GmailConfig {
    pub access_token: String,
    pub sender: String,
    pub recipient: String,
}

/// Report sender backed by the Gmail REST API
pub struct GmailSender {
    config: GmailConfig,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    id: Option<String>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

impl GmailSender {
    pub fn new(config: GmailConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    /// Build the base64url-encoded raw RFC 2822 message
    fn raw_message(&self, subject: &str, body: &str) -> String {
        let mime = format!(
            "From: {}\r\nTo: {}\r\nSubject: {}\r\nContent-Type: text/plain; charset=utf-8\r\n\r\n{}",
            self.config.sender, self.config.recipient, subject, body
        );
        general_purpose::URL_SAFE_NO_PAD.encode(mime.as_bytes())
    }
}

#[async_trait]
impl ReportSender for GmailSender {
    async fn send(&self, subject: &str, markdown_body: &str) -> Result<()> {
        let url = "https://gmail.googleapis.com/gmail/v1/users/me/messages/send";

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.config.access_token)
            .json(&serde_json::json!({
                "raw": self.raw_message(subject, markdown_body),
            }))
            .send()
            .await
            .context("failed to reach the mail API")?;

        let status = response.status();
        let result: SendResponse = response
            .json()
            .await
            .context("failed to parse mail API response")?;

        if let Some(error) = result.error {
            anyhow::bail!("mail API error: {}", error.message);
        }
        if !status.is_success() {
            anyhow::bail!("mail API returned status {}", status);
        }

        tracing::info!(message_id = ?result.id, "report email sent");
        Ok(())
    }
}
