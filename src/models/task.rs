//! Task record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
}

/// A task owned by exactly one user.
///
/// The reminder triad: `reminder_set` opts in, `reminder_time` is when it
/// fires, `reminder_sent` flips to true only after a successful delivery and
/// is never reset.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(default)]
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub category: String,
    /// Owning user's id.
    #[serde(rename = "user")]
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
    pub reminder_set: bool,
    pub reminder_time: Option<DateTime<Utc>>,
    pub reminder_sent: bool,
}

impl Task {
    /// A fresh pending task with no reminder, owned by `user_id`.
    pub fn new(
        user_id: impl Into<String>,
        title: impl Into<String>,
        category: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: String::new(),
            title: title.into(),
            description: None,
            status: TaskStatus::Pending,
            priority: TaskPriority::Medium,
            category: category.into(),
            user_id: user_id.into(),
            created_at: now,
            completed_at: None,
            due_date: None,
            reminder_set: false,
            reminder_time: None,
            reminder_sent: false,
        }
    }
}
