//! Telegram integration: transport, session management, commands, rendering.

pub mod api;
pub mod commands;
pub mod connection;
pub mod format;

pub use api::{BotApi, HttpBotApi, Update};
pub use commands::{Command, CommandRouter};
pub use connection::{
    ConnectionConfig, ConnectionManager, ConnectionState, DeliveryOutcome, UpdateHandler,
};
