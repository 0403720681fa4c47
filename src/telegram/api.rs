//! Raw Telegram Bot API transport.
//!
//! `BotApi` is the seam between the connection manager and the wire: the
//! reqwest implementation talks to `api.telegram.org`, tests substitute a
//! stub. HTTP 409 from `getUpdates` means another session is polling the
//! same bot and is surfaced as [`BotError::Conflict`].

use async_trait::async_trait;

use crate::error::BotError;

/// One inbound message, flattened from a Bot API update.
#[derive(Debug, Clone)]
pub struct Update {
    pub update_id: i64,
    pub chat_id: String,
    pub username: Option<String>,
    pub text: String,
}

/// Outbound/inbound primitives of the bot session. Exactly one live session
/// may call these at a time; the connection manager owns that session.
#[async_trait]
pub trait BotApi: Send + Sync {
    /// Health check (`getMe`).
    async fn get_me(&self) -> Result<(), BotError>;

    /// Long-poll for updates past `offset`.
    async fn get_updates(&self, offset: i64, timeout_secs: u64) -> Result<Vec<Update>, BotError>;

    /// Send a text message to a chat.
    async fn send_message(&self, chat_id: &str, text: &str, markdown: bool)
    -> Result<(), BotError>;
}

/// reqwest-backed implementation against the raw Bot API.
pub struct HttpBotApi {
    token: String,
    client: reqwest::Client,
}

impl HttpBotApi {
    /// Fails with [`BotError::MissingCredential`] when the token is absent
    /// or blank — callers treat that as "feature disabled", not fatal.
    pub fn new(token: Option<String>) -> Result<Self, BotError> {
        let token = token
            .filter(|t| !t.trim().is_empty())
            .ok_or(BotError::MissingCredential)?;
        Ok(Self {
            token,
            client: reqwest::Client::new(),
        })
    }

    fn api_url(&self, method: &str) -> String {
        format!("https://api.telegram.org/bot{}/{method}", self.token)
    }

    async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, BotError> {
        let status = resp.status();
        if status.as_u16() == 409 {
            return Err(BotError::Conflict);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(BotError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp)
    }
}

#[async_trait]
impl BotApi for HttpBotApi {
    async fn get_me(&self) -> Result<(), BotError> {
        let resp = self
            .client
            .get(self.api_url("getMe"))
            .send()
            .await
            .map_err(|e| BotError::Http(e.to_string()))?;
        Self::check_status(resp).await?;
        Ok(())
    }

    async fn get_updates(&self, offset: i64, timeout_secs: u64) -> Result<Vec<Update>, BotError> {
        let body = serde_json::json!({
            "offset": offset,
            "timeout": timeout_secs,
            "allowed_updates": ["message"]
        });

        let resp = self
            .client
            .post(self.api_url("getUpdates"))
            .json(&body)
            .send()
            .await
            .map_err(|e| BotError::Http(e.to_string()))?;
        let resp = Self::check_status(resp).await?;

        let data: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| BotError::Http(e.to_string()))?;

        let mut updates = Vec::new();
        if let Some(results) = data.get("result").and_then(serde_json::Value::as_array) {
            for update in results {
                let Some(update_id) = update.get("update_id").and_then(serde_json::Value::as_i64)
                else {
                    continue;
                };
                let Some(message) = update.get("message") else {
                    continue;
                };
                let Some(text) = message.get("text").and_then(serde_json::Value::as_str) else {
                    continue;
                };
                let Some(chat_id) = message
                    .get("chat")
                    .and_then(|c| c.get("id"))
                    .and_then(serde_json::Value::as_i64)
                else {
                    continue;
                };
                let username = message
                    .get("from")
                    .and_then(|f| f.get("username"))
                    .and_then(|u| u.as_str())
                    .map(String::from);

                updates.push(Update {
                    update_id,
                    chat_id: chat_id.to_string(),
                    username,
                    text: text.to_string(),
                });
            }
        }
        Ok(updates)
    }

    /// Markdown-first with plain-text fallback, the Bot API rejects messages
    /// with unbalanced markup otherwise.
    async fn send_message(
        &self,
        chat_id: &str,
        text: &str,
        markdown: bool,
    ) -> Result<(), BotError> {
        let mut body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
        });
        if markdown {
            body["parse_mode"] = serde_json::Value::String("Markdown".into());
        }

        let resp = self
            .client
            .post(self.api_url("sendMessage"))
            .json(&body)
            .send()
            .await
            .map_err(|e| BotError::Http(e.to_string()))?;

        if markdown && resp.status().is_client_error() && resp.status().as_u16() != 409 {
            tracing::warn!(
                status = %resp.status(),
                "sendMessage with Markdown failed; retrying without parse_mode"
            );
            let plain = serde_json::json!({
                "chat_id": chat_id,
                "text": text,
            });
            let resp = self
                .client
                .post(self.api_url("sendMessage"))
                .json(&plain)
                .send()
                .await
                .map_err(|e| BotError::Http(e.to_string()))?;
            Self::check_status(resp).await?;
            return Ok(());
        }

        Self::check_status(resp).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_or_blank_token_is_rejected() {
        assert!(matches!(
            HttpBotApi::new(None),
            Err(BotError::MissingCredential)
        ));
        assert!(matches!(
            HttpBotApi::new(Some("   ".into())),
            Err(BotError::MissingCredential)
        ));
    }

    #[test]
    fn api_url_embeds_token_and_method() {
        let api = HttpBotApi::new(Some("123:ABC".into())).unwrap();
        assert_eq!(
            api.api_url("getMe"),
            "https://api.telegram.org/bot123:ABC/getMe"
        );
        assert_eq!(
            api.api_url("sendMessage"),
            "https://api.telegram.org/bot123:ABC/sendMessage"
        );
    }

    #[tokio::test]
    async fn send_to_unreachable_host_is_an_http_error() {
        let api = HttpBotApi::new(Some("fake-token".into())).unwrap();
        // No server behind the fake token; expect a transport-level error.
        let result = api.send_message("123456", "hello", false).await;
        assert!(result.is_err());
    }
}
