mod bot;
mod command;
mod config;
mod generator;
mod notifications;
mod platform;
mod scheduler;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::bot::AppState;
use crate::config::Config;
use crate::generator::OjichatGenerator;
use crate::platform::slack::SlackClient;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,ojibot=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    info!("Loading configuration from: {}", config_path.display());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    info!("Configuration loaded successfully");
    info!("  Announce channel: {}", config.slack.channel);
    info!("  Generator: {}", config.generator.command);
    info!("  Delay between runs: {:?}", config.scheduler.delay());
    if let Some(max_runs) = config.scheduler.max_runs {
        info!("  Max runs per command: {}", max_runs);
    }

    let slack = Arc::new(SlackClient::new(&config.slack));
    let generator = Arc::new(OjichatGenerator::new(&config.generator));

    // Create shared state
    let state = Arc::new(AppState::new(config, slack.clone(), generator));

    info!("Bot is starting...");
    bot::run(state, slack).await?;

    Ok(())
}
