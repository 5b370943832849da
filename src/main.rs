//! # Giveaway Bot Main Entry Point
//!
//! Initializes logging, loads configuration, connects the storage backend,
//! then runs the supervised Telegram bot next to the HTTP API.

use anyhow::Result;
use std::sync::Arc;
use teloxide::prelude::*;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use giveaway_bot::bot::handlers::BotHandler;
use giveaway_bot::bot::BotSettings;
use giveaway_bot::config::Config;
use giveaway_bot::database::connection::DatabaseManager;
use giveaway_bot::services::notify::BotLinks;
use giveaway_bot::services::supervisor::{BotStatus, BotSupervisor};
use giveaway_bot::services::telegram::TelegramNotifier;
use giveaway_bot::utils::logging::log_system_event;
use giveaway_bot::web::{self, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "giveaway_bot=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    info!("Starting Giveaway Bot v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Configuration loaded - Storage: {}, HTTP Port: {}, Admins: {}",
        config.storage.backend_name(),
        config.http_port,
        config.admin_ids.len()
    );

    // Initialize storage
    let db = DatabaseManager::connect(&config.storage).await?;
    db.run_migrations().await?;
    info!("Storage initialized successfully");

    let bot = Bot::new(&config.telegram_bot_token);
    let telegram = Arc::new(TelegramNotifier::new(bot.clone(), config.channel_id.as_deref()));
    let bot_status = BotStatus::new();

    let links = BotLinks {
        bot_username: config.bot_username.clone(),
        web_app_url: config.web_app_url.clone(),
    };
    let state = AppState::new(db.clone(), telegram.clone(), telegram, links, config.admin_ids.clone());
    let app = web::router(state, bot_status.clone());

    // The bot may end up degraded; the API keeps serving either way
    let handler = BotHandler::new(db, BotSettings::from_config(&config));
    let supervisor = BotSupervisor::new(bot, handler, bot_status);
    let bot_task = tokio::spawn(supervisor.run());

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.http_port))
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to port {}: {}", config.http_port, e))?;
    info!("HTTP server listening on port {}", config.http_port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| anyhow::anyhow!("HTTP server error: {}", e))?;

    bot_task.abort();
    log_system_event("Application stopped", None);
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
