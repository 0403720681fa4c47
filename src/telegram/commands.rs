//! Inbound bot commands.
//!
//! Everything here goes through the repositories; the router holds no state
//! of its own. Plain text that is not a command is ignored.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::clock::Clock;
use crate::error::RepoError;
use crate::repo::{TaskRepository, UserRepository};
use crate::telegram::api::Update;
use crate::telegram::connection::{ConnectionManager, UpdateHandler};
use crate::telegram::format;

/// Parsed command surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    /// `/connect` with an optional 6-digit code.
    Connect(Option<String>),
    Disconnect,
    Tasks,
    Today,
    Notifications,
    Unknown(String),
}

impl Command {
    /// Parse a message text. Returns `None` for anything that is not a
    /// slash command.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if !text.starts_with('/') {
            return None;
        }
        let mut parts = text.split_whitespace();
        let command = parts.next().unwrap_or_default();

        Some(match command {
            "/start" => Self::Start,
            "/help" => Self::Help,
            "/connect" => {
                let code = parts
                    .next()
                    .filter(|arg| arg.chars().all(|c| c.is_ascii_digit()))
                    .map(String::from);
                Self::Connect(code)
            }
            "/disconnect" => Self::Disconnect,
            "/tasks" => Self::Tasks,
            "/today" => Self::Today,
            "/notifications" => Self::Notifications,
            other => Self::Unknown(other.to_string()),
        })
    }
}

const HELP_TEXT: &str = "*PlanPilot bot commands:*\n\n\
    /start - Start working with the bot\n\
    /tasks - View your tasks\n\
    /today - Today's tasks\n\
    /connect - Link your PlanPilot account\n\
    /disconnect - Unlink your account\n\
    /notifications - Toggle notifications\n\
    /help - Show this help";

/// Routes parsed commands to the repositories and replies through the
/// connection manager.
pub struct CommandRouter {
    users: Arc<UserRepository>,
    tasks: Arc<TaskRepository>,
    clock: Arc<dyn Clock>,
}

impl CommandRouter {
    pub fn new(
        users: Arc<UserRepository>,
        tasks: Arc<TaskRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            users,
            tasks,
            clock,
        }
    }

    /// Build the reply for one command. Separated from delivery so it is
    /// testable without a session.
    pub async fn respond(&self, command: Command, update: &Update) -> Option<String> {
        let chat_id = update.chat_id.as_str();
        let reply = match command {
            Command::Start => match self.users.find_by_chat_id(chat_id).await {
                Ok(Some(user)) => format!(
                    "Hello, {}! Your account is already linked to PlanPilot. \
                     Use the commands to manage your tasks.",
                    user.name
                ),
                Ok(None) => "Hello! I'm the PlanPilot task bot. To link your account, \
                     send /connect with the code from the PlanPilot app."
                    .to_string(),
                Err(e) => self.storage_error("start", e),
            },

            Command::Help => HELP_TEXT.to_string(),

            Command::Connect(code) => self.connect(chat_id, update, code).await,

            Command::Disconnect => match self.users.disconnect(chat_id).await {
                Ok(Some(_)) => "Account unlinked. You will no longer receive notifications."
                    .to_string(),
                Ok(None) => "You are not linked to any PlanPilot account.".to_string(),
                Err(e) => self.storage_error("disconnect", e),
            },

            Command::Tasks => match self.users.find_by_chat_id(chat_id).await {
                Ok(Some(user)) => match self.tasks.find_by_user(&user.id).await {
                    Ok(tasks) if tasks.is_empty() => "You have no active tasks.".to_string(),
                    Ok(tasks) => format::task_list(&tasks),
                    Err(e) => self.storage_error("tasks", e),
                },
                Ok(None) => NOT_CONNECTED.to_string(),
                Err(e) => self.storage_error("tasks", e),
            },

            Command::Today => match self.users.find_by_chat_id(chat_id).await {
                Ok(Some(user)) => {
                    match self.tasks.find_today(&user.id, self.clock.now()).await {
                        Ok(tasks) if tasks.is_empty() => {
                            "You have no tasks for today.".to_string()
                        }
                        Ok(tasks) => format::today_list(&tasks),
                        Err(e) => self.storage_error("today", e),
                    }
                }
                Ok(None) => NOT_CONNECTED.to_string(),
                Err(e) => self.storage_error("today", e),
            },

            Command::Notifications => match self.users.toggle_notifications(chat_id).await {
                Ok(Some(user)) => {
                    if user.telegram.notifications_enabled {
                        "Notifications enabled. You will receive task reminders.".to_string()
                    } else {
                        "Notifications disabled. You will not receive task reminders."
                            .to_string()
                    }
                }
                Ok(None) => NOT_CONNECTED.to_string(),
                Err(e) => self.storage_error("notifications", e),
            },

            Command::Unknown(cmd) => {
                format!("Unknown command: {cmd}. Use /help to see available commands.")
            }
        };
        Some(reply)
    }

    async fn connect(&self, chat_id: &str, update: &Update, code: Option<String>) -> String {
        match self.users.find_by_chat_id(chat_id).await {
            Ok(Some(existing)) => {
                return format!(
                    "You are already linked to the account {}. To link a different \
                     account, first run /disconnect.",
                    existing.name
                );
            }
            Ok(None) => {}
            Err(e) => return self.storage_error("connect", e),
        }

        let Some(code) = code else {
            return "Please send the connection code as: /connect CODE\n\
                 You can get a code in the PlanPilot app, in your profile."
                .to_string();
        };

        match self
            .users
            .redeem_connection_code(&code, chat_id, update.username.as_deref(), self.clock.now())
            .await
        {
            Ok(user) => format!(
                "Account linked successfully! Welcome, {}.\n\
                 You can now manage your tasks from Telegram.",
                user.name
            ),
            Err(RepoError::CodeInvalidOrExpired) => {
                "Invalid or expired connection code. Please generate a new one \
                 in the PlanPilot app."
                    .to_string()
            }
            Err(e) => self.storage_error("connect", e),
        }
    }

    fn storage_error(&self, context: &str, e: RepoError) -> String {
        warn!("Command {context} failed: {e}");
        "Something went wrong. Please try again later.".to_string()
    }
}

const NOT_CONNECTED: &str = "Please link your PlanPilot account first with /connect.";

#[async_trait]
impl UpdateHandler for CommandRouter {
    async fn handle(&self, manager: &ConnectionManager, update: Update) {
        let Some(command) = Command::parse(&update.text) else {
            return;
        };
        if let Some(reply) = self.respond(command, &update).await {
            // Replies are best-effort; a failed send is logged and dropped.
            if let crate::telegram::connection::DeliveryOutcome::Failed(reason) =
                manager.deliver(&update.chat_id, &reply).await
            {
                warn!(chat_id = %update.chat_id, "Failed to send reply: {reason}");
            }
        }
    }
}
