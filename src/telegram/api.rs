// Minimal Telegram Bot API client. It deliberately exposes only the calls
// the listener needs: long-polling for updates, sending status texts, and
// downloading attachments.

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tokio::fs;

/// Long-poll wait passed to getUpdates.
pub const POLL_TIMEOUT_SECS: u32 = 30;

#[derive(Debug, Error)]
pub enum TelegramError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Telegram API error: {0}")]
    Api(String),

    /// HTTP 429 - retried with backoff by the notifier, fatal nowhere.
    #[error("Telegram rate limit hit")]
    RateLimited,

    #[error("I/O error: {0}")]
    Io(String),
}

// ============================================================================
// WIRE TYPES
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
    pub channel_post: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub chat: Chat,
    pub from: Option<User>,
    pub text: Option<String>,
    pub caption: Option<String>,
    pub video: Option<FileRef>,
    pub audio: Option<FileRef>,
    pub voice: Option<FileRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileRef {
    pub file_id: String,
}

#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    ok: bool,
    description: Option<String>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct FileInfo {
    file_path: Option<String>,
}

// ============================================================================
// CLIENT
// ============================================================================

pub struct TelegramClient {
    client: Client,
    api_base: String,
    file_base: String,
}

impl TelegramClient {
    pub fn new(bot_token: &str) -> Result<Self, TelegramError> {
        let client = Client::builder()
            // Above the long-poll wait so getUpdates can idle out cleanly.
            .timeout(Duration::from_secs(50))
            .build()
            .map_err(|e| TelegramError::Http(e.to_string()))?;
        Ok(Self {
            client,
            api_base: format!("https://api.telegram.org/bot{}", bot_token),
            file_base: format!("https://api.telegram.org/file/bot{}", bot_token),
        })
    }

    async fn unwrap_envelope<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, TelegramError> {
        if response.status().as_u16() == 429 {
            return Err(TelegramError::RateLimited);
        }
        let envelope: ApiEnvelope<T> = response
            .json()
            .await
            .map_err(|e| TelegramError::Http(e.to_string()))?;
        if !envelope.ok {
            return Err(TelegramError::Api(
                envelope
                    .description
                    .unwrap_or_else(|| "unknown error".to_string()),
            ));
        }
        envelope
            .result
            .ok_or_else(|| TelegramError::Api("missing result".to_string()))
    }

    /// Fetch pending updates, waiting server-side up to the poll timeout.
    pub async fn get_updates(&self, offset: i64) -> Result<Vec<Update>, TelegramError> {
        let response = self
            .client
            .post(format!("{}/getUpdates", self.api_base))
            .json(&json!({
                "offset": offset,
                "timeout": POLL_TIMEOUT_SECS,
                "allowed_updates": ["message", "channel_post"],
            }))
            .send()
            .await
            .map_err(|e| TelegramError::Http(e.to_string()))?;
        Self::unwrap_envelope(response).await
    }

    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), TelegramError> {
        let response = self
            .client
            .post(format!("{}/sendMessage", self.api_base))
            .json(&json!({ "chat_id": chat_id, "text": text }))
            .send()
            .await
            .map_err(|e| TelegramError::Http(e.to_string()))?;
        Self::unwrap_envelope::<serde_json::Value>(response).await?;
        Ok(())
    }

    /// Resolve a file id and download its content to `dest`.
    pub async fn download_file(&self, file_id: &str, dest: &Path) -> Result<(), TelegramError> {
        let response = self
            .client
            .post(format!("{}/getFile", self.api_base))
            .json(&json!({ "file_id": file_id }))
            .send()
            .await
            .map_err(|e| TelegramError::Http(e.to_string()))?;
        let info: FileInfo = Self::unwrap_envelope(response).await?;
        let file_path = info
            .file_path
            .ok_or_else(|| TelegramError::Api("file has no path".to_string()))?;

        let bytes = self
            .client
            .get(format!("{}/{}", self.file_base, file_path))
            .send()
            .await
            .map_err(|e| TelegramError::Http(e.to_string()))?
            .bytes()
            .await
            .map_err(|e| TelegramError::Http(e.to_string()))?;
        fs::write(dest, &bytes)
            .await
            .map_err(|e| TelegramError::Io(e.to_string()))
    }
}
