//! Reminder scheduler — periodically delivers due task reminders.
//!
//! Each tick queries the due set, delivers independently per task, and marks
//! a reminder sent only after a successful delivery. A failed delivery
//! leaves the task in the due set for the next tick; a reminder for a
//! disconnected or muted user is skipped without being marked, so it is
//! simply abandoned until the user's state changes the outcome.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::models::Task;
use crate::repo::{TaskRepository, UserRepository};
use crate::telegram::connection::{ConnectionManager, ConnectionState, DeliveryOutcome};
use crate::telegram::format;

/// Per-tick counters, mostly for logging and tests.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickSummary {
    /// Tasks in the due set at tick time.
    pub due: usize,
    /// Delivered and marked sent.
    pub sent: usize,
    /// Skipped without delivery (owner missing, disconnected, or muted).
    pub skipped: usize,
    /// Delivery attempted and failed; retried next tick.
    pub failed: usize,
}

pub struct ReminderScheduler {
    users: Arc<UserRepository>,
    tasks: Arc<TaskRepository>,
    bot: Arc<ConnectionManager>,
    clock: Arc<dyn Clock>,
}

impl ReminderScheduler {
    pub fn new(
        users: Arc<UserRepository>,
        tasks: Arc<TaskRepository>,
        bot: Arc<ConnectionManager>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            users,
            tasks,
            bot,
            clock,
        }
    }

    /// Process one round of due reminders. One task's failure never blocks
    /// the rest of the due set.
    pub async fn tick(&self) -> TickSummary {
        let now = self.clock.now();
        let due = match self.tasks.find_due_reminders(now).await {
            Ok(due) => due,
            Err(e) => {
                warn!("Due-reminder query failed: {e}");
                return TickSummary::default();
            }
        };

        let mut summary = TickSummary {
            due: due.len(),
            ..TickSummary::default()
        };

        for task in due {
            match self.process_one(&task).await {
                ReminderOutcome::Sent => summary.sent += 1,
                ReminderOutcome::Skipped => summary.skipped += 1,
                ReminderOutcome::Failed => summary.failed += 1,
            }
        }

        if summary.due > 0 {
            info!(
                due = summary.due,
                sent = summary.sent,
                skipped = summary.skipped,
                failed = summary.failed,
                "Reminder tick complete"
            );
        }
        summary
    }

    async fn process_one(&self, task: &Task) -> ReminderOutcome {
        let user = match self.users.find_by_id(&task.user_id).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                warn!(task_id = %task.id, "Reminder owner not found; skipping");
                return ReminderOutcome::Skipped;
            }
            Err(e) => {
                warn!(task_id = %task.id, "Owner lookup failed: {e}");
                return ReminderOutcome::Failed;
            }
        };

        // Not eligible: skip without marking sent. Deliberately no
        // redelivery bookkeeping — if the user reconnects, only reminders
        // still due on a later tick will fire.
        let chat_id = match user.telegram.chat_id.as_deref() {
            Some(chat_id)
                if user.telegram.is_connected && user.telegram.notifications_enabled =>
            {
                chat_id
            }
            _ => {
                debug!(task_id = %task.id, user_id = %user.id, "Owner not reachable; skipping");
                return ReminderOutcome::Skipped;
            }
        };

        let message = format::reminder_message(&user, task);
        match self.bot.deliver(chat_id, &message).await {
            DeliveryOutcome::Delivered => {
                match self.tasks.mark_reminder_sent(&task.id).await {
                    Ok(true) => ReminderOutcome::Sent,
                    Ok(false) => {
                        warn!(task_id = %task.id, "Delivered reminder for a task that vanished");
                        ReminderOutcome::Sent
                    }
                    Err(e) => {
                        // Delivered but not marked: the reminder will repeat
                        // next tick rather than be lost.
                        warn!(task_id = %task.id, "Failed to mark reminder sent: {e}");
                        ReminderOutcome::Failed
                    }
                }
            }
            DeliveryOutcome::Failed(reason) => {
                warn!(task_id = %task.id, "Reminder delivery failed: {reason}");
                ReminderOutcome::Failed
            }
        }
    }
}

enum ReminderOutcome {
    Sent,
    Skipped,
    Failed,
}

/// Spawn the recurring tick. The immediate first tick is skipped so the
/// connection manager has time to finish initializing.
pub fn spawn_ticker(
    scheduler: Arc<ReminderScheduler>,
    period: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        // Skip immediate first tick
        ticker.tick().await;

        loop {
            ticker.tick().await;
            if scheduler.bot.state().await == ConnectionState::Stopped {
                break;
            }
            scheduler.tick().await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::Clock;
    use crate::error::BotError;
    use crate::store::JsonStore;
    use crate::telegram::api::{BotApi, Update};
    use crate::telegram::connection::ConnectionConfig;
    use async_trait::async_trait;
    use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::Mutex;

    struct FixedClock(DateTime<Utc>);

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    /// Records sends; optionally fails them all.
    struct RecordingApi {
        sends: Mutex<Vec<(String, String)>>,
        fail: AtomicBool,
    }

    impl RecordingApi {
        fn new() -> Self {
            Self {
                sends: Mutex::new(Vec::new()),
                fail: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl BotApi for RecordingApi {
        async fn get_me(&self) -> Result<(), BotError> {
            Ok(())
        }
        async fn get_updates(
            &self,
            _offset: i64,
            _timeout_secs: u64,
        ) -> Result<Vec<Update>, BotError> {
            Ok(Vec::new())
        }
        async fn send_message(
            &self,
            chat_id: &str,
            text: &str,
            _markdown: bool,
        ) -> Result<(), BotError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(BotError::Http("stub failure".into()));
            }
            self.sends
                .lock()
                .await
                .push((chat_id.to_string(), text.to_string()));
            Ok(())
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 1, 12, 0, 0).unwrap()
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        users: Arc<UserRepository>,
        tasks: Arc<TaskRepository>,
        api: Arc<RecordingApi>,
        scheduler: ReminderScheduler,
    }

    async fn fixture() -> Fixture {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = JsonStore::open(dir.path()).await.expect("open store");
        let users = Arc::new(UserRepository::new(&store));
        let tasks = Arc::new(TaskRepository::new(&store));
        let api = Arc::new(RecordingApi::new());
        let bot = Arc::new(ConnectionManager::new(
            Arc::clone(&api) as Arc<dyn BotApi>,
            ConnectionConfig::default(),
        ));
        bot.initialize().await.expect("init");

        let scheduler = ReminderScheduler::new(
            Arc::clone(&users),
            Arc::clone(&tasks),
            bot,
            Arc::new(FixedClock(t0())),
        );
        Fixture {
            _dir: dir,
            users,
            tasks,
            api,
            scheduler,
        }
    }

    async fn connected_user(fixture: &Fixture, notifications: bool) -> crate::models::User {
        let user = fixture
            .users
            .create("Olena", "olena@example.com", "secret123", t0())
            .await
            .unwrap();
        let code = fixture
            .users
            .generate_connection_code(&user.id, t0())
            .await
            .unwrap()
            .unwrap();
        let user = fixture
            .users
            .redeem_connection_code(&code, "chat-1", None, t0())
            .await
            .unwrap();
        if !notifications {
            fixture
                .users
                .toggle_notifications("chat-1")
                .await
                .unwrap()
                .unwrap();
        }
        user
    }

    async fn due_task(fixture: &Fixture, user_id: &str) -> Task {
        let mut task = Task::new(user_id, "Pay rent", "finance", t0());
        task.reminder_set = true;
        task.reminder_time = Some(t0() - ChronoDuration::seconds(1));
        fixture.tasks.create(&task).await.unwrap()
    }

    #[tokio::test]
    async fn due_reminder_is_delivered_once_and_marked_sent() {
        let fixture = fixture().await;
        let user = connected_user(&fixture, true).await;
        let task = due_task(&fixture, &user.id).await;

        let summary = fixture.scheduler.tick().await;
        assert_eq!(
            summary,
            TickSummary {
                due: 1,
                sent: 1,
                skipped: 0,
                failed: 0
            }
        );

        let sends = fixture.api.sends.lock().await;
        assert_eq!(sends.len(), 1, "exactly one deliver call");
        assert_eq!(sends[0].0, "chat-1");
        assert!(sends[0].1.contains("Pay rent"));
        drop(sends);

        let stored = fixture.tasks.find_by_id(&task.id).await.unwrap().unwrap();
        assert!(stored.reminder_sent);

        // Next tick: nothing due, nothing sent again.
        let summary = fixture.scheduler.tick().await;
        assert_eq!(summary.due, 0);
        assert_eq!(fixture.api.sends.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn muted_user_is_skipped_without_delivery_or_marking() {
        let fixture = fixture().await;
        let user = connected_user(&fixture, false).await;
        let task = due_task(&fixture, &user.id).await;

        let summary = fixture.scheduler.tick().await;
        assert_eq!(summary.due, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.sent, 0);

        // deliver was never called, and the reminder stays unsent.
        assert!(fixture.api.sends.lock().await.is_empty());
        let stored = fixture.tasks.find_by_id(&task.id).await.unwrap().unwrap();
        assert!(!stored.reminder_sent);
    }

    #[tokio::test]
    async fn disconnected_user_is_skipped() {
        let fixture = fixture().await;
        let user = connected_user(&fixture, true).await;
        let task = due_task(&fixture, &user.id).await;
        fixture.users.disconnect("chat-1").await.unwrap();

        let summary = fixture.scheduler.tick().await;
        assert_eq!(summary.skipped, 1);
        assert!(fixture.api.sends.lock().await.is_empty());
        let stored = fixture.tasks.find_by_id(&task.id).await.unwrap().unwrap();
        assert!(!stored.reminder_sent);
    }

    #[tokio::test]
    async fn failed_delivery_is_retried_next_tick() {
        let fixture = fixture().await;
        let user = connected_user(&fixture, true).await;
        let task = due_task(&fixture, &user.id).await;

        fixture.api.fail.store(true, Ordering::SeqCst);
        let summary = fixture.scheduler.tick().await;
        assert_eq!(summary.failed, 1);
        let stored = fixture.tasks.find_by_id(&task.id).await.unwrap().unwrap();
        assert!(!stored.reminder_sent, "failed delivery must not mark sent");

        // Transport recovers; the same task is still due and now succeeds.
        fixture.api.fail.store(false, Ordering::SeqCst);
        let summary = fixture.scheduler.tick().await;
        assert_eq!(summary.sent, 1);
        let stored = fixture.tasks.find_by_id(&task.id).await.unwrap().unwrap();
        assert!(stored.reminder_sent);
    }

    #[tokio::test]
    async fn one_bad_task_does_not_block_the_rest() {
        let fixture = fixture().await;
        let user = connected_user(&fixture, true).await;

        // Task owned by a user that no longer exists.
        let orphan = due_task(&fixture, "ghost-user").await;
        let good = due_task(&fixture, &user.id).await;

        let summary = fixture.scheduler.tick().await;
        assert_eq!(summary.due, 2);
        assert_eq!(summary.sent, 1);
        assert_eq!(summary.skipped, 1);

        let stored = fixture.tasks.find_by_id(&good.id).await.unwrap().unwrap();
        assert!(stored.reminder_sent);
        let stored = fixture.tasks.find_by_id(&orphan.id).await.unwrap().unwrap();
        assert!(!stored.reminder_sent);
    }
}
