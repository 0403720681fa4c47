//! Connection manager — owns the single live bot session.
//!
//! The session lifecycle is an explicit state machine instead of a
//! process-global bot handle:
//!
//! ```text
//! Uninitialized → Connecting → Active → (conflict) Recovering → Active
//!                                     → Stopped (shutdown)
//! ```
//!
//! A takeover conflict (another process polling the same bot) puts the
//! manager into `Recovering`; it waits a fixed backoff and re-establishes.
//! Delivery never propagates errors — callers get a [`DeliveryOutcome`] and
//! decide whether to retry on the next tick.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::BotError;
use crate::models::User;
use crate::telegram::api::{BotApi, Update};

/// Session lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Uninitialized,
    Connecting,
    Active,
    Recovering,
    Stopped,
}

/// Per-message delivery result. `Failed` is an outcome, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    Failed(String),
}

/// Receives inbound updates from the polling loop.
#[async_trait]
pub trait UpdateHandler: Send + Sync {
    async fn handle(&self, manager: &ConnectionManager, update: Update);
}

/// Tuning knobs for the session.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub conflict_backoff: Duration,
    pub send_timeout: Duration,
    pub poll_timeout_secs: u64,
    /// Wait after a non-conflict poll error before retrying.
    pub error_retry: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            conflict_backoff: Duration::from_secs(5),
            send_timeout: Duration::from_secs(10),
            poll_timeout_secs: 30,
            error_retry: Duration::from_secs(5),
        }
    }
}

pub struct ConnectionManager {
    api: Arc<dyn BotApi>,
    state: RwLock<ConnectionState>,
    config: ConnectionConfig,
}

impl ConnectionManager {
    pub fn new(api: Arc<dyn BotApi>, config: ConnectionConfig) -> Self {
        Self {
            api,
            state: RwLock::new(ConnectionState::Uninitialized),
            config,
        }
    }

    pub async fn state(&self) -> ConnectionState {
        *self.state.read().await
    }

    /// Establish the session: `Connecting`, health check, `Active`.
    /// Re-invocation while already `Active` is a no-op — there is never a
    /// second session.
    pub async fn initialize(&self) -> Result<(), BotError> {
        {
            let mut state = self.state.write().await;
            match *state {
                ConnectionState::Active => {
                    debug!("Connection already active; initialize is a no-op");
                    return Ok(());
                }
                ConnectionState::Stopped => return Err(BotError::NotActive),
                _ => *state = ConnectionState::Connecting,
            }
        }

        let result = self.api.get_me().await;
        let mut state = self.state.write().await;
        // Shutdown may have raced the health check; never resurrect Stopped.
        if *state == ConnectionState::Stopped {
            return Err(BotError::NotActive);
        }
        match result {
            Ok(()) => {
                *state = ConnectionState::Active;
                info!("Telegram session active");
                Ok(())
            }
            Err(e) => {
                *state = ConnectionState::Uninitialized;
                Err(e)
            }
        }
    }

    /// Send a message to a chat. Returns `Failed` (never `Err`) when the
    /// session is not active, the send times out, or the API rejects it.
    pub async fn deliver(&self, chat_id: &str, text: &str) -> DeliveryOutcome {
        if self.state().await != ConnectionState::Active {
            return DeliveryOutcome::Failed(BotError::NotActive.to_string());
        }

        let send = self.api.send_message(chat_id, text, true);
        match tokio::time::timeout(self.config.send_timeout, send).await {
            Ok(Ok(())) => DeliveryOutcome::Delivered,
            Ok(Err(e)) => DeliveryOutcome::Failed(e.to_string()),
            Err(_) => {
                DeliveryOutcome::Failed(BotError::Timeout(self.config.send_timeout).to_string())
            }
        }
    }

    /// Deliver to a user, failing up front when the user is disconnected,
    /// has no bound chat, or has muted notifications.
    pub async fn notify_user(&self, user: &User, text: &str) -> DeliveryOutcome {
        if !user.telegram.is_connected {
            return DeliveryOutcome::Failed("user is not connected".into());
        }
        let Some(chat_id) = user.telegram.chat_id.as_deref() else {
            return DeliveryOutcome::Failed("user has no chat id".into());
        };
        if !user.telegram.notifications_enabled {
            return DeliveryOutcome::Failed("notifications disabled".into());
        }
        self.deliver(chat_id, text).await
    }

    /// Long-poll for updates until shutdown, recovering from takeover
    /// conflicts with a fixed backoff. Runs as the process's only session.
    pub async fn run_polling(self: Arc<Self>, handler: Arc<dyn UpdateHandler>) {
        let mut offset: i64 = 0;
        info!("Telegram polling started");

        loop {
            match self.state().await {
                ConnectionState::Stopped => break,
                ConnectionState::Active => {}
                // Not established; keep trying to bring the session up.
                _ => {
                    tokio::time::sleep(self.config.error_retry).await;
                    if let Err(e) = self.initialize().await {
                        warn!("Session establish failed: {e}");
                    }
                    continue;
                }
            }

            match self.api.get_updates(offset, self.config.poll_timeout_secs).await {
                Ok(updates) => {
                    for update in updates {
                        offset = update.update_id + 1;
                        handler.handle(&self, update).await;
                    }
                }
                Err(BotError::Conflict) => {
                    if !self.recover_from_conflict().await {
                        break;
                    }
                }
                Err(e) => {
                    warn!("Telegram poll error: {e}");
                    tokio::time::sleep(self.config.error_retry).await;
                }
            }
        }

        info!("Telegram polling stopped");
    }

    /// Conflict recovery: stop the session, wait the fixed backoff, then
    /// re-establish. Returns false when shutdown was requested meanwhile.
    async fn recover_from_conflict(&self) -> bool {
        warn!(
            backoff_secs = self.config.conflict_backoff.as_secs(),
            "Another session took over polling; recovering"
        );
        *self.state.write().await = ConnectionState::Recovering;

        tokio::time::sleep(self.config.conflict_backoff).await;

        match self.initialize().await {
            Ok(()) => info!("Telegram session re-established after conflict"),
            // Shutdown was requested while we were backing off.
            Err(BotError::NotActive) => return false,
            // Establish failed; the polling loop keeps retrying.
            Err(e) => warn!("Re-establish failed after conflict: {e}"),
        }
        true
    }

    /// Stop the session. The polling loop observes the state and exits.
    pub async fn shutdown(&self) {
        *self.state.write().await = ConnectionState::Stopped;
        info!("Telegram session shut down");
    }
}
