use std::sync::Arc;

use planpilot::clock::SystemClock;
use planpilot::config::AppConfig;
use planpilot::repo::{TaskRepository, UserRepository};
use planpilot::scheduler::{self, ReminderScheduler};
use planpilot::store::JsonStore;
use planpilot::telegram::api::HttpBotApi;
use planpilot::telegram::connection::{ConnectionConfig, ConnectionManager};
use planpilot::telegram::CommandRouter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = AppConfig::from_env();

    eprintln!("📋 PlanPilot v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Data dir: {}", config.data_dir.display());
    eprintln!(
        "   Reminder tick: every {}s",
        config.reminder_interval.as_secs()
    );

    // A missing data directory is fatal at startup, not at first write.
    let store = JsonStore::open(&config.data_dir).await.unwrap_or_else(|e| {
        eprintln!(
            "Error: Failed to open data directory {}: {}",
            config.data_dir.display(),
            e
        );
        std::process::exit(1);
    });

    let users = Arc::new(UserRepository::new(&store));
    let tasks = Arc::new(TaskRepository::new(&store));
    let clock = Arc::new(SystemClock);

    let api = match HttpBotApi::new(config.telegram_token.clone()) {
        Ok(api) => api,
        Err(e) => {
            // The store and repositories still work; only the bot side is off.
            eprintln!("   Telegram: disabled ({e})");
            tracing::warn!("Telegram disabled: {e}");
            tokio::signal::ctrl_c().await?;
            return Ok(());
        }
    };
    eprintln!("   Telegram: enabled");

    let manager = Arc::new(ConnectionManager::new(
        Arc::new(api),
        ConnectionConfig {
            conflict_backoff: config.conflict_backoff,
            send_timeout: config.send_timeout,
            poll_timeout_secs: config.poll_timeout_secs,
            ..ConnectionConfig::default()
        },
    ));

    if let Err(e) = manager.initialize().await {
        // The polling loop keeps retrying until the session comes up.
        tracing::warn!("Initial Telegram connect failed: {e}");
    }

    let router = Arc::new(CommandRouter::new(
        Arc::clone(&users),
        Arc::clone(&tasks),
        clock.clone() as Arc<dyn planpilot::clock::Clock>,
    ));
    let poll_handle = tokio::spawn(Arc::clone(&manager).run_polling(router));

    let reminder = Arc::new(ReminderScheduler::new(
        users,
        tasks,
        Arc::clone(&manager),
        clock,
    ));
    let tick_handle = scheduler::spawn_ticker(reminder, config.reminder_interval);

    tokio::signal::ctrl_c().await?;
    eprintln!("\nShutting down...");

    manager.shutdown().await;
    let drain = async {
        let _ = poll_handle.await;
        let _ = tick_handle.await;
    };
    if tokio::time::timeout(config.shutdown_grace, drain).await.is_err() {
        tracing::warn!(
            grace_secs = config.shutdown_grace.as_secs(),
            "Shutdown grace period elapsed; exiting with tasks still running"
        );
    }

    Ok(())
}
