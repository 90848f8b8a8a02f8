//! Telegram Bot API client and the channel delivery built on it.
//!
//! Only the three methods the bot needs are wrapped: `sendMessage`, `getMe`
//! and `getUpdates`. Request URLs carry the bot token, so transport errors
//! are stripped of their URL before they can reach a log line.

use crate::digest::Digest;
use crate::traits::DeliveryChannel;
use crate::types::{DigestError, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";
/// Must exceed the longest `getUpdates` long-poll timeout.
const CLIENT_TIMEOUT_SECS: u64 = 75;

#[derive(Debug, Clone, Deserialize)]
pub struct BotUser {
    pub id: i64,
    pub first_name: String,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Deserialize)]
struct ResponseParameters {
    #[serde(default)]
    retry_after: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    parameters: Option<ResponseParameters>,
}

pub struct TelegramClient {
    client: reqwest::Client,
    token: String,
    api_base: String,
}

impl std::fmt::Debug for TelegramClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramClient")
            .field("api_base", &self.api_base)
            .finish_non_exhaustive()
    }
}

impl TelegramClient {
    pub fn new(token: impl Into<String>) -> Result<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(DigestError::Config("Telegram bot token must not be empty".into()));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(CLIENT_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            token,
            api_base: DEFAULT_API_BASE.to_string(),
        })
    }

    /// Points the client at another Bot API server.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, body: serde_json::Value) -> Result<T> {
        let url = format!("{}/bot{}/{}", self.api_base, self.token, method);

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| DigestError::Http(e.without_url()))?;

        let status = response.status();
        let resp: ApiResponse<T> = response
            .json()
            .await
            .map_err(|e| DigestError::Http(e.without_url()))?;

        if resp.ok {
            return resp
                .result
                .ok_or_else(|| DigestError::Telegram(format!("{method}: missing result")));
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = resp
                .parameters
                .and_then(|p| p.retry_after)
                .unwrap_or(30);
            return Err(DigestError::RateLimited { retry_after_secs: retry_after });
        }

        let description = resp
            .description
            .unwrap_or_else(|| "Unknown Telegram API error".to_string());
        Err(DigestError::Telegram(format!("{method}: {description}")))
    }

    /// Sends `text` as MarkdownV2 with link previews disabled.
    pub async fn send_message(&self, chat_id: &str, text: &str) -> Result<Message> {
        debug!(chat_id = %chat_id, chars = text.chars().count(), "Sending Telegram message");
        self.call(
            "sendMessage",
            json!({
                "chat_id": chat_id,
                "text": text,
                "parse_mode": "MarkdownV2",
                "link_preview_options": { "is_disabled": true },
            }),
        )
        .await
    }

    /// Sends `text` with no parse mode.
    pub async fn send_plain(&self, chat_id: &str, text: &str) -> Result<Message> {
        self.call(
            "sendMessage",
            json!({
                "chat_id": chat_id,
                "text": text,
            }),
        )
        .await
    }

    pub async fn get_me(&self) -> Result<BotUser> {
        self.call("getMe", json!({})).await
    }

    /// Long-polls for updates newer than `offset`.
    pub async fn get_updates(&self, offset: Option<i64>, timeout_secs: u64) -> Result<Vec<Update>> {
        let mut body = json!({
            "timeout": timeout_secs,
            "allowed_updates": ["message"],
        });
        if let Some(offset) = offset {
            body["offset"] = json!(offset);
        }
        self.call("getUpdates", body).await
    }
}

/// Delivers digests to one configured chat or channel.
pub struct TelegramChannel {
    client: Arc<TelegramClient>,
    chat_id: String,
}

impl TelegramChannel {
    pub fn new(client: Arc<TelegramClient>, chat_id: impl Into<String>) -> Self {
        Self {
            client,
            chat_id: chat_id.into(),
        }
    }
}

#[async_trait]
impl DeliveryChannel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn deliver(&self, digest: &Digest) -> Result<()> {
        let message = self.client.send_message(&self.chat_id, &digest.text).await?;
        info!(
            chat_id = %self.chat_id,
            message_id = message.message_id,
            articles = digest.articles.len(),
            "Digest delivered"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_token_rejected() {
        let err = TelegramClient::new("  ").unwrap_err();
        assert!(err.to_string().contains("must not be empty"));
    }

    #[test]
    fn debug_output_hides_token() {
        let client = TelegramClient::new("123:SECRET").unwrap();
        assert!(!format!("{client:?}").contains("SECRET"));
    }

    #[test]
    fn decodes_updates() {
        let raw = r#"{"ok":true,"result":[
            {"update_id":10,"message":{"message_id":1,"chat":{"id":-100,"type":"group"},"text":"/digest@agri_bot"}},
            {"update_id":11,"edited_message":{"message_id":2,"chat":{"id":5,"type":"private"}}}
        ]}"#;
        let resp: ApiResponse<Vec<Update>> = serde_json::from_str(raw).unwrap();
        let updates = resp.result.unwrap();
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0].message.as_ref().unwrap().chat.id, -100);
        assert!(updates[1].message.is_none());
    }
}
