//! User record and its Telegram/subscription sub-documents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered account. Field names stay camelCase on disk to match the
/// original JSON documents.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Store-generated uuid, empty until first persisted.
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub email: String,
    /// Argon2id hash in PHC string format, never the raw password.
    pub password: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub telegram: TelegramLink,
    #[serde(default)]
    pub subscription: Subscription,
}

/// Telegram pairing state.
///
/// `connection_code`/`code_expires` are set only while a pairing is pending;
/// redeeming the code clears both and flips `is_connected` in one update.
/// `notifications_enabled` is meaningful only while connected.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelegramLink {
    pub chat_id: Option<String>,
    pub username: Option<String>,
    pub is_connected: bool,
    pub connection_code: Option<String>,
    pub code_expires: Option<DateTime<Utc>>,
    pub notifications_enabled: bool,
}

impl Default for TelegramLink {
    fn default() -> Self {
        Self {
            chat_id: None,
            username: None,
            is_connected: false,
            connection_code: None,
            code_expires: None,
            notifications_enabled: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub plan: String,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub active: bool,
    pub auto_renew: bool,
}

impl Default for Subscription {
    fn default() -> Self {
        Self {
            plan: "free".to_string(),
            start_date: None,
            end_date: None,
            active: false,
            auto_renew: false,
        }
    }
}
