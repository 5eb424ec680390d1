//! Encourage Bot - Rust Edition
//!
//! A Discord community bot with moderation, music playback, interactive
//! widgets, suggestions, a status rotation and an AI chat.

mod audio;
mod bot;
mod chat;
mod commands;
mod config;
mod database;
mod rapidapi;

use config::Config;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "info,encourage_bot=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Encourage Bot starting...");

    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            error!("Please ensure DISCORD_TOKEN is set in .env file");
            std::process::exit(1);
        }
    };

    info!("Configuration loaded successfully (prefix '{}')", config.command_prefix);

    // Downloaded songs live here while they play
    if let Err(e) = std::fs::create_dir_all(&config.temp_audio_dir) {
        error!("Failed to create temp audio directory: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = bot::run(config).await {
        error!("Bot error: {}", e);
        std::process::exit(1);
    }
}
