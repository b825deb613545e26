mod bootstrap;
mod handler;

use anyhow::Result;
use tokio::sync::watch;

use askwolf_core::config::{AppConfig, LoadOptions};
use askwolf_slack::analytics::spawn_event_logger;

fn init_logging(config: &AppConfig) {
    use askwolf_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Load config and initialize logging before any other operations
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let event_logger = spawn_event_logger(app.analytics_events, shutdown_rx);

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        reply_policy = ?app.config.bot.reply_policy,
        "askwolf started"
    );

    let connection_result = tokio::select! {
        result = app.slack_runner.start() => result,
        _ = wait_for_shutdown() => Ok(()),
    };

    // Stop the analytics logger before exiting on any return path so the
    // background task is never leaked.
    let _ = shutdown_tx.send(true);
    let _ = event_logger.await;

    if let Err(error) = &connection_result {
        tracing::error!(
            event_name = "system.server.connection_failed",
            correlation_id = "shutdown",
            error = %error,
            "slack connection loop failed; exiting"
        );
    }
    connection_result?;

    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        "askwolf stopping"
    );

    Ok(())
}

async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
