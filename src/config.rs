//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

/// Runtime configuration, read from the environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Directory holding the JSON collections (`users.json`, `tasks.json`).
    pub data_dir: PathBuf,
    /// Telegram bot token. `None` means reminders are disabled.
    pub telegram_token: Option<String>,
    /// Period between reminder scheduler ticks.
    pub reminder_interval: Duration,
    /// Fixed wait before re-establishing the session after a takeover conflict.
    pub conflict_backoff: Duration,
    /// Per-message send timeout (one stuck delivery must not starve a tick).
    pub send_timeout: Duration,
    /// Long-poll timeout passed to getUpdates, in seconds.
    pub poll_timeout_secs: u64,
    /// Grace period allowed for in-flight work on shutdown.
    pub shutdown_grace: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            telegram_token: None,
            reminder_interval: Duration::from_secs(60),
            conflict_backoff: Duration::from_secs(5),
            send_timeout: Duration::from_secs(10),
            poll_timeout_secs: 30,
            shutdown_grace: Duration::from_secs(5),
        }
    }
}

impl AppConfig {
    /// Build a config from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let data_dir = std::env::var("PLANPILOT_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.data_dir);

        let telegram_token = std::env::var("TELEGRAM_BOT_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty());

        let reminder_interval = env_secs("PLANPILOT_REMINDER_INTERVAL_SECS")
            .map(Duration::from_secs)
            .unwrap_or(defaults.reminder_interval);

        let conflict_backoff = env_secs("PLANPILOT_CONFLICT_BACKOFF_SECS")
            .map(Duration::from_secs)
            .unwrap_or(defaults.conflict_backoff);

        let send_timeout = env_secs("PLANPILOT_SEND_TIMEOUT_SECS")
            .map(Duration::from_secs)
            .unwrap_or(defaults.send_timeout);

        Self {
            data_dir,
            telegram_token,
            reminder_interval,
            conflict_backoff,
            send_timeout,
            ..defaults
        }
    }
}

fn env_secs(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}
