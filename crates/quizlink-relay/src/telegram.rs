//! Outbound Telegram delivery.
//!
//! One attempt per destination, bounded by a fixed timeout, no retry.
//! The [`MessageSender`] trait is the seam between the fan-out engine and
//! the wire so tests can substitute a recording mock.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

/// Telegram Bot API host.
const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Upper bound for one delivery attempt.
pub const SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors from one outbound delivery attempt.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    /// Building the client or performing the HTTP request failed.
    #[error("Request error: {0}")]
    Request(String),

    /// Telegram returned a non-success status code.
    #[error("Telegram API error (status {status}): {body}")]
    Api {
        /// HTTP status code returned by Telegram.
        status: u16,
        /// Response body snippet.
        body: String,
    },
}

/// One outbound message delivery.
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send_message(&self, token: &str, chat_id: &str, text: &str)
    -> Result<(), SendError>;
}

/// Production sender over the Telegram Bot API.
#[derive(Debug, Clone)]
pub struct TelegramClient {
    http: reqwest::Client,
    api_base: String,
}

impl TelegramClient {
    /// Build a client with the fixed per-request [`SEND_TIMEOUT`].
    pub fn new() -> Result<Self, SendError> {
        Self::with_api_base(TELEGRAM_API_BASE)
    }

    /// Build a client against a custom API base URL.
    pub fn with_api_base(api_base: impl Into<String>) -> Result<Self, SendError> {
        let http = reqwest::Client::builder()
            .timeout(SEND_TIMEOUT)
            .build()
            .map_err(|e| SendError::Request(e.to_string()))?;
        Ok(Self {
            http,
            api_base: api_base.into(),
        })
    }
}

#[async_trait]
impl MessageSender for TelegramClient {
    async fn send_message(
        &self,
        token: &str,
        chat_id: &str,
        text: &str,
    ) -> Result<(), SendError> {
        let url = format!("{}/bot{token}/sendMessage", self.api_base);

        let response = self
            .http
            .post(&url)
            .form(&[("chat_id", chat_id), ("text", text)])
            .send()
            .await
            .map_err(|e| SendError::Request(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            debug!(chat_id, "Message delivered");
            Ok(())
        } else {
            let status_code = status.as_u16();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<failed to read body>".to_string());
            warn!(chat_id, status = status_code, body = %body, "Telegram API returned error");
            Err(SendError::Api {
                status: status_code,
                body,
            })
        }
    }
}
