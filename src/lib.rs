//! PlanPilot core: flat-file task storage, Telegram pairing, and the
//! reminder scheduler.

pub mod auth;
pub mod clock;
pub mod config;
pub mod error;
pub mod models;
pub mod repo;
pub mod scheduler;
pub mod store;
pub mod telegram;

pub use error::{Error, Result};
