//! User repository — account creation and Telegram pairing.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde_json::json;

use crate::auth;
use crate::error::RepoError;
use crate::models::{Subscription, TelegramLink, User};
use crate::store::{Collection, Filter, JsonStore};

/// Pairing codes are valid for this long after generation.
const CODE_VALIDITY_MINUTES: i64 = 10;

pub struct UserRepository {
    users: Collection<User>,
}

impl UserRepository {
    pub fn new(store: &JsonStore) -> Self {
        Self {
            users: Collection::new(store.collection("users")),
        }
    }

    /// Create an account with hashed password and default (disconnected,
    /// free-plan) sub-documents. Fails when the email is already taken.
    pub async fn create(
        &self,
        name: &str,
        email: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> Result<User, RepoError> {
        if self.find_by_email(email).await?.is_some() {
            return Err(RepoError::DuplicateEmail(email.to_string()));
        }

        let user = User {
            id: String::new(),
            name: name.to_string(),
            email: email.to_string(),
            password: auth::hash_password(password)?,
            created_at: now,
            telegram: TelegramLink::default(),
            subscription: Subscription::default(),
        };
        Ok(self.users.create(&user).await?)
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<User>, RepoError> {
        Ok(self.users.get(id).await?)
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepoError> {
        let matches = self.users.scan(&Filter::eq("email", email)).await?;
        Ok(matches.into_iter().next())
    }

    /// Every inbound bot command resolves its user through the chat id.
    pub async fn find_by_chat_id(&self, chat_id: &str) -> Result<Option<User>, RepoError> {
        let matches = self
            .users
            .scan(&Filter::eq("telegram.chatId", chat_id))
            .await?;
        Ok(matches.into_iter().next())
    }

    /// Match a pending pairing code. Expiry is exclusive: a code whose
    /// `codeExpires` equals `now` is already dead.
    pub async fn find_by_connection_code(
        &self,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, RepoError> {
        let filter = Filter::and(vec![
            Filter::eq("telegram.connectionCode", code),
            Filter::gt("telegram.codeExpires", json!(now)),
        ]);
        let matches = self.users.scan(&filter).await?;
        Ok(matches.into_iter().next())
    }

    /// Issue a 6-digit pairing code valid for ten minutes. Returns `None`
    /// when the user does not exist.
    pub async fn generate_connection_code(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<String>, RepoError> {
        let Some(mut user) = self.find_by_id(user_id).await? else {
            return Ok(None);
        };

        let code = format!("{:06}", rand::thread_rng().gen_range(100_000..1_000_000));
        user.telegram.connection_code = Some(code.clone());
        user.telegram.code_expires = Some(now + Duration::minutes(CODE_VALIDITY_MINUTES));

        self.save_telegram(&user.id, &user.telegram).await?;
        Ok(Some(code))
    }

    /// Redeem a pairing code: bind the chat, clear the code fields, and set
    /// connected state in a single record update.
    pub async fn redeem_connection_code(
        &self,
        code: &str,
        chat_id: &str,
        username: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<User, RepoError> {
        let Some(mut user) = self.find_by_connection_code(code, now).await? else {
            return Err(RepoError::CodeInvalidOrExpired);
        };

        user.telegram.chat_id = Some(chat_id.to_string());
        user.telegram.username = username.map(str::to_string);
        user.telegram.is_connected = true;
        user.telegram.connection_code = None;
        user.telegram.code_expires = None;

        self.save_telegram(&user.id, &user.telegram).await?;
        Ok(user)
    }

    /// Unbind the chat. Returns the user that was disconnected, if any.
    pub async fn disconnect(&self, chat_id: &str) -> Result<Option<User>, RepoError> {
        let Some(mut user) = self.find_by_chat_id(chat_id).await? else {
            return Ok(None);
        };

        user.telegram.chat_id = None;
        user.telegram.username = None;
        user.telegram.is_connected = false;
        user.telegram.connection_code = None;
        user.telegram.code_expires = None;

        self.save_telegram(&user.id, &user.telegram).await?;
        Ok(Some(user))
    }

    /// Flip `notificationsEnabled` for a connected chat. Returns the updated
    /// user, or `None` when the chat is not linked.
    pub async fn toggle_notifications(&self, chat_id: &str) -> Result<Option<User>, RepoError> {
        let Some(mut user) = self.find_by_chat_id(chat_id).await? else {
            return Ok(None);
        };

        user.telegram.notifications_enabled = !user.telegram.notifications_enabled;
        self.save_telegram(&user.id, &user.telegram).await?;
        Ok(Some(user))
    }

    /// Set `notificationsEnabled` to an explicit value.
    pub async fn set_notifications(
        &self,
        chat_id: &str,
        enabled: bool,
    ) -> Result<Option<User>, RepoError> {
        let Some(mut user) = self.find_by_chat_id(chat_id).await? else {
            return Ok(None);
        };

        user.telegram.notifications_enabled = enabled;
        self.save_telegram(&user.id, &user.telegram).await?;
        Ok(Some(user))
    }

    /// Shallow-merge a partial document over the user record.
    pub async fn update(
        &self,
        user_id: &str,
        partial: serde_json::Value,
    ) -> Result<Option<User>, RepoError> {
        Ok(self.users.update(user_id, partial).await?)
    }

    pub fn verify_password(&self, user: &User, password: &str) -> Result<bool, RepoError> {
        auth::verify_password(password, &user.password)
    }

    pub async fn delete(&self, id: &str) -> Result<bool, RepoError> {
        Ok(self.users.delete(id).await?)
    }

    /// Persist a full telegram sub-document. The store's merge is shallow,
    /// so the whole sub-document is written at once — that is what makes the
    /// code-clearing and connect flags land atomically per record.
    async fn save_telegram(&self, user_id: &str, link: &TelegramLink) -> Result<(), RepoError> {
        let partial = json!({
            "telegram": serde_json::to_value(link)
                .map_err(|e| crate::error::StoreError::Serialization(e.to_string()))?
        });
        self.users.update(user_id, partial).await?;
        Ok(())
    }
}
