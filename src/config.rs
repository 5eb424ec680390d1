//! Configuration management for Encourage Bot
//!
//! Loads settings from environment variables (.env file)

use std::env;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Discord bot token
    pub discord_token: String,
    /// OpenAI API key; the AI chat answers with a notice when absent
    pub openai_api_key: Option<String>,
    /// Chat completion model
    pub openai_model: String,
    /// RapidAPI key used for jokes and cat pictures
    pub rapidapi_key: Option<String>,
    /// SQLite database file
    pub database_path: PathBuf,
    /// Prefix for text commands
    pub command_prefix: String,
    /// Text channel that receives welcome/goodbye messages
    pub welcome_channel: String,
    /// Text channel that receives bug reports
    pub bug_report_channel: String,
    /// Audio clip played when the bot joins a voice channel
    pub greeting_audio: Option<PathBuf>,
    /// Directory for downloaded songs while they play
    pub temp_audio_dir: PathBuf,
    /// yt-dlp executable
    pub ytdlp_path: String,
    /// Interval between random status changes
    pub status_interval: Duration,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let discord_token = non_empty("DISCORD_TOKEN")
            .or_else(|| non_empty("TOKEN"))
            .ok_or_else(|| ConfigError::MissingEnvVar("DISCORD_TOKEN".to_string()))?;

        let command_prefix = non_empty("COMMAND_PREFIX").unwrap_or_else(|| "!".to_string());
        if command_prefix.chars().any(char::is_whitespace) {
            return Err(ConfigError::InvalidValue(
                "COMMAND_PREFIX".to_string(),
                command_prefix,
            ));
        }

        let status_interval = non_empty("STATUS_INTERVAL")
            .map(|s| {
                s.parse::<u64>()
                    .ok()
                    .filter(|secs| *secs > 0)
                    .ok_or_else(|| ConfigError::InvalidValue("STATUS_INTERVAL".to_string(), s))
            })
            .transpose()?
            .unwrap_or(300);

        Ok(Self {
            discord_token,
            openai_api_key: non_empty("OPENAI_API_KEY"),
            openai_model: non_empty("OPENAI_MODEL").unwrap_or_else(|| models::GPT_35_TURBO.to_string()),
            rapidapi_key: non_empty("RAPIDAPI_KEY").or_else(|| non_empty("JOKEAPI")),
            database_path: non_empty("DATABASE_PATH")
                .unwrap_or_else(|| "encourage_bot.db".to_string())
                .into(),
            command_prefix,
            welcome_channel: non_empty("WELCOME_CHANNEL").unwrap_or_else(|| "general".to_string()),
            bug_report_channel: non_empty("BUG_REPORT_CHANNEL")
                .unwrap_or_else(|| "bug-reports".to_string()),
            greeting_audio: non_empty("GREETING_AUDIO").map(PathBuf::from),
            temp_audio_dir: non_empty("TEMP_AUDIO_DIR")
                .unwrap_or_else(|| "temp_audio".to_string())
                .into(),
            ytdlp_path: non_empty("YTDLP_PATH").unwrap_or_else(|| "yt-dlp".to_string()),
            status_interval: Duration::from_secs(status_interval),
        })
    }
}

fn non_empty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.trim().is_empty())
}

/// OpenAI model identifiers
pub mod models {
    pub const GPT_35_TURBO: &str = "gpt-3.5-turbo";
}
