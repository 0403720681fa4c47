//! Plain value types persisted by the store.

pub mod task;
pub mod user;

pub use task::{Task, TaskPriority, TaskStatus};
pub use user::{Subscription, TelegramLink, User};
