//! Task repository — CRUD plus the reminder due-set queries.

use chrono::{DateTime, Utc};
use serde_json::json;

use crate::error::RepoError;
use crate::models::{Task, TaskStatus};
use crate::store::{Collection, Filter, JsonStore};

pub struct TaskRepository {
    tasks: Collection<Task>,
}

impl TaskRepository {
    pub fn new(store: &JsonStore) -> Self {
        Self {
            tasks: Collection::new(store.collection("tasks")),
        }
    }

    pub async fn create(&self, task: &Task) -> Result<Task, RepoError> {
        Ok(self.tasks.create(task).await?)
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<Task>, RepoError> {
        Ok(self.tasks.get(id).await?)
    }

    pub async fn find_by_user(&self, user_id: &str) -> Result<Vec<Task>, RepoError> {
        Ok(self.tasks.scan(&Filter::eq("user", user_id)).await?)
    }

    /// Tasks whose reminder is armed, unsent, and due at or before `now`.
    /// Re-queryable every tick; no ordering guarantee.
    pub async fn find_due_reminders(&self, now: DateTime<Utc>) -> Result<Vec<Task>, RepoError> {
        let filter = Filter::and(vec![
            Filter::eq("reminderSet", true),
            Filter::eq("reminderSent", false),
            Filter::lte("reminderTime", json!(now)),
        ]);
        Ok(self.tasks.scan(&filter).await?)
    }

    /// Flip `reminderSent` to true. Idempotent: marking an already-sent task
    /// is a no-op success. Returns false only when the task does not exist.
    pub async fn mark_reminder_sent(&self, task_id: &str) -> Result<bool, RepoError> {
        let updated = self
            .tasks
            .update(task_id, json!({"reminderSent": true}))
            .await?;
        Ok(updated.is_some())
    }

    /// Mark a task completed and stamp `completedAt`.
    pub async fn complete(
        &self,
        task_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Task>, RepoError> {
        let partial = json!({
            "status": TaskStatus::Completed,
            "completedAt": now,
        });
        Ok(self.tasks.update(task_id, partial).await?)
    }

    /// The `/today` view: tasks due today, plus anything in progress.
    pub async fn find_today(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<Task>, RepoError> {
        let start = now.date_naive().and_time(chrono::NaiveTime::MIN).and_utc();
        let end = start + chrono::Duration::days(1);

        let mine = self.find_by_user(user_id).await?;
        Ok(mine
            .into_iter()
            .filter(|task| {
                let due_today = task
                    .due_date
                    .map(|due| due >= start && due < end)
                    .unwrap_or(false);
                due_today || task.status == TaskStatus::InProgress
            })
            .collect())
    }

    pub async fn update(
        &self,
        task_id: &str,
        partial: serde_json::Value,
    ) -> Result<Option<Task>, RepoError> {
        Ok(self.tasks.update(task_id, partial).await?)
    }

    pub async fn delete(&self, task_id: &str) -> Result<bool, RepoError> {
        Ok(self.tasks.delete(task_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TaskPriority;
    use chrono::{Duration, TimeZone};

    async fn repo() -> (tempfile::TempDir, TaskRepository) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = JsonStore::open(dir.path()).await.expect("open store");
        (dir, TaskRepository::new(&store))
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 1, 12, 0, 0).unwrap()
    }

    fn reminder_task(user: &str, offset_secs: i64) -> Task {
        let mut task = Task::new(user, "Pay rent", "finance", t0());
        task.reminder_set = true;
        task.reminder_time = Some(t0() + Duration::seconds(offset_secs));
        task
    }

    #[tokio::test]
    async fn due_query_selects_only_armed_unsent_due_tasks() {
        let (_dir, repo) = repo().await;

        let due = repo.create(&reminder_task("u1", -1)).await.unwrap();
        let future = repo.create(&reminder_task("u1", 3600)).await.unwrap();

        // Armed but already sent.
        let mut sent = reminder_task("u1", -10);
        sent.reminder_sent = true;
        let sent = repo.create(&sent).await.unwrap();

        // Due time in the past but reminder never armed.
        let mut unarmed = reminder_task("u1", -10);
        unarmed.reminder_set = false;
        let unarmed = repo.create(&unarmed).await.unwrap();

        let found = repo.find_due_reminders(t0()).await.unwrap();
        let ids: Vec<&str> = found.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec![due.id.as_str()]);
        assert!(!ids.contains(&future.id.as_str()));
        assert!(!ids.contains(&sent.id.as_str()));
        assert!(!ids.contains(&unarmed.id.as_str()));
    }

    #[tokio::test]
    async fn reminder_due_exactly_now_is_selected() {
        let (_dir, repo) = repo().await;
        repo.create(&reminder_task("u1", 0)).await.unwrap();
        let found = repo.find_due_reminders(t0()).await.unwrap();
        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn marked_task_leaves_due_set_permanently() {
        let (_dir, repo) = repo().await;
        let task = repo.create(&reminder_task("u1", -1)).await.unwrap();

        assert!(repo.mark_reminder_sent(&task.id).await.unwrap());

        for offset in [0, 60, 3600, 86_400] {
            let later = t0() + Duration::seconds(offset);
            assert!(
                repo.find_due_reminders(later).await.unwrap().is_empty(),
                "marked task reappeared at +{offset}s"
            );
        }
    }

    #[tokio::test]
    async fn mark_reminder_sent_is_idempotent() {
        let (_dir, repo) = repo().await;
        let task = repo.create(&reminder_task("u1", -1)).await.unwrap();

        assert!(repo.mark_reminder_sent(&task.id).await.unwrap());
        assert!(repo.mark_reminder_sent(&task.id).await.unwrap());

        let stored = repo.find_by_id(&task.id).await.unwrap().unwrap();
        assert!(stored.reminder_sent);
    }

    #[tokio::test]
    async fn mark_reminder_sent_on_missing_task_reports_not_found() {
        let (_dir, repo) = repo().await;
        assert!(!repo.mark_reminder_sent("missing").await.unwrap());
    }

    #[tokio::test]
    async fn complete_stamps_completed_at() {
        let (_dir, repo) = repo().await;
        let task = repo
            .create(&Task::new("u1", "Ship it", "work", t0()))
            .await
            .unwrap();

        let done = repo
            .complete(&task.id, t0() + Duration::hours(1))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(done.status, TaskStatus::Completed);
        assert_eq!(done.completed_at, Some(t0() + Duration::hours(1)));
    }

    #[tokio::test]
    async fn find_today_includes_due_today_and_in_progress() {
        let (_dir, repo) = repo().await;

        let mut due_today = Task::new("u1", "Dentist", "health", t0());
        due_today.due_date = Some(t0() + Duration::hours(3));
        let due_today = repo.create(&due_today).await.unwrap();

        let mut in_progress = Task::new("u1", "Essay", "study", t0());
        in_progress.status = TaskStatus::InProgress;
        let in_progress = repo.create(&in_progress).await.unwrap();

        let mut due_tomorrow = Task::new("u1", "Laundry", "home", t0());
        due_tomorrow.due_date = Some(t0() + Duration::days(2));
        let due_tomorrow = repo.create(&due_tomorrow).await.unwrap();

        // Another user's task never shows up.
        let mut other = Task::new("u2", "Other", "misc", t0());
        other.due_date = Some(t0() + Duration::hours(1));
        repo.create(&other).await.unwrap();

        let today = repo.find_today("u1", t0()).await.unwrap();
        let ids: Vec<&str> = today.iter().map(|t| t.id.as_str()).collect();
        assert!(ids.contains(&due_today.id.as_str()));
        assert!(ids.contains(&in_progress.id.as_str()));
        assert!(!ids.contains(&due_tomorrow.id.as_str()));
        assert_eq!(today.len(), 2);
    }

    #[tokio::test]
    async fn partial_update_keeps_other_fields() {
        let (_dir, repo) = repo().await;
        let mut task = Task::new("u1", "Original", "home", t0());
        task.priority = TaskPriority::High;
        let task = repo.create(&task).await.unwrap();

        let updated = repo
            .update(&task.id, json!({"title": "Renamed"}))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.title, "Renamed");
        assert_eq!(updated.priority, TaskPriority::High);
        assert_eq!(updated.category, "home");
    }
}
