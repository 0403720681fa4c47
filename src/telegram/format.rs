//! Pure message rendering — no I/O, no error paths beyond absent optionals.

use crate::models::{Task, TaskPriority, TaskStatus, User};

/// Descriptions in list views are cut at this many characters.
const DESCRIPTION_PREVIEW_LEN: usize = 50;

pub fn priority_glyph(priority: TaskPriority) -> &'static str {
    match priority {
        TaskPriority::High => "🔴",
        TaskPriority::Medium => "🟠",
        TaskPriority::Low => "🟢",
    }
}

pub fn status_glyph(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Completed => "✅",
        TaskStatus::InProgress => "⏳",
        TaskStatus::Pending => "⏰",
    }
}

/// The reminder message: addressed by name, then title, priority glyph,
/// category, and the description when there is one.
pub fn reminder_message(user: &User, task: &Task) -> String {
    let mut msg = format!(
        "*Task reminder for {}*\n\n{} *{}*\nCategory: {}\n",
        user.name,
        priority_glyph(task.priority),
        task.title,
        task.category
    );
    if let Some(description) = task.description.as_deref() {
        msg.push_str(&format!("Description: {description}\n"));
    }
    msg
}

/// Numbered task list for the `/tasks` command.
pub fn task_list(tasks: &[Task]) -> String {
    let mut msg = String::from("*Your tasks:*\n\n");
    for (index, task) in tasks.iter().enumerate() {
        msg.push_str(&format!(
            "{}. {} {} *{}*\n",
            index + 1,
            status_glyph(task.status),
            priority_glyph(task.priority),
            task.title
        ));
        if let Some(description) = task.description.as_deref() {
            msg.push_str(&format!(
                "   {}\n",
                truncate(description, DESCRIPTION_PREVIEW_LEN)
            ));
        }
        msg.push_str(&format!("   Category: {}\n\n", task.category));
    }
    msg
}

/// Shorter list for `/today` — no descriptions.
pub fn today_list(tasks: &[Task]) -> String {
    let mut msg = String::from("*Today's tasks:*\n\n");
    for (index, task) in tasks.iter().enumerate() {
        msg.push_str(&format!(
            "{}. {} {} *{}*\n   Category: {}\n\n",
            index + 1,
            status_glyph(task.status),
            priority_glyph(task.priority),
            task.title,
            task.category
        ));
    }
    msg
}

/// Cut at a char boundary, appending an ellipsis when anything was removed.
fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}
