//! Error types for PlanPilot.

use std::time::Duration;

/// Top-level error type for the crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Repository error: {0}")]
    Repo(#[from] RepoError),

    #[error("Bot error: {0}")]
    Bot(#[from] BotError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Document store errors.
///
/// Absent records are `Option`/`bool` results, never errors — these variants
/// cover problems with the backing file itself.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Repository-level errors.
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("A user with email {0} already exists")]
    DuplicateEmail(String),

    /// Deliberately identical for unknown and expired codes.
    #[error("Connection code is invalid or expired")]
    CodeInvalidOrExpired,

    #[error("Password hashing failed: {0}")]
    Password(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Telegram connection errors.
#[derive(Debug, thiserror::Error)]
pub enum BotError {
    #[error("No bot token configured")]
    MissingCredential,

    /// Another session is polling the same bot (HTTP 409).
    #[error("Another bot session took over polling")]
    Conflict,

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Bot API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Connection manager is not active")]
    NotActive,
}

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;
