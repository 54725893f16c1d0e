use std::path::Path;

use crate::bot::BotSettings;
use crate::error::{HabitTrackerError, Result};
use crate::scheduler::{parse_timezone, DailyTime};
use crate::telegram::DEFAULT_API_URL;

pub const DEFAULT_MORNING_TIME: &str = "08:00";
pub const DEFAULT_EVENING_TIME: &str = "21:00";
pub const DEFAULT_TIMEZONE: &str = "America/Argentina/Buenos_Aires";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_DATA_DIR: &str = "./data";

#[derive(Debug, Clone)]
pub struct Config {
    pub telegram_bot_token: String,
    pub telegram_chat_id: Option<i64>,
    pub morning_time: String,
    pub evening_time: String,
    pub timezone: String,
    pub webhook_url: Option<String>,
    pub port: u16,
    pub data_dir: String,
    pub telegram_api_url: String,
}

impl Config {
    /// Reads the process environment, after loading `.env` when present.
    pub fn from_env() -> Result<Self> {
        match dotenvy::dotenv() {
            Ok(path) => tracing::debug!("loaded environment from {}", path.display()),
            Err(err) if err.not_found() => {}
            Err(err) => return Err(HabitTrackerError::Config(err.to_string())),
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_env_file(path: impl AsRef<Path>) -> Result<Self> {
        dotenvy::from_path(path.as_ref())
            .map_err(|e| HabitTrackerError::Config(format!("{}: {e}", path.as_ref().display())))?;
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let telegram_bot_token = get("TELEGRAM_BOT_TOKEN").ok_or_else(|| {
            HabitTrackerError::Config("TELEGRAM_BOT_TOKEN is required".to_string())
        })?;
        let telegram_chat_id = get("TELEGRAM_CHAT_ID")
            .map(|raw| {
                raw.parse::<i64>().map_err(|_| {
                    HabitTrackerError::Config(format!("TELEGRAM_CHAT_ID '{raw}' is not a number"))
                })
            })
            .transpose()?;
        let port = get("PORT")
            .map(|raw| {
                raw.parse::<u16>().map_err(|_| {
                    HabitTrackerError::Config(format!("PORT '{raw}' is not a valid port"))
                })
            })
            .transpose()?
            .unwrap_or(DEFAULT_PORT);

        let config = Self {
            telegram_bot_token,
            telegram_chat_id,
            morning_time: get("MORNING_TIME").unwrap_or_else(|| DEFAULT_MORNING_TIME.to_string()),
            evening_time: get("EVENING_TIME").unwrap_or_else(|| DEFAULT_EVENING_TIME.to_string()),
            timezone: get("TIMEZONE").unwrap_or_else(|| DEFAULT_TIMEZONE.to_string()),
            webhook_url: get("WEBHOOK_URL"),
            port,
            data_dir: get("DATA_DIR").unwrap_or_else(|| DEFAULT_DATA_DIR.to_string()),
            telegram_api_url: get("TELEGRAM_API_URL")
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
        };
        config.bot_settings()?;
        Ok(config)
    }

    pub fn bot_settings(&self) -> Result<BotSettings> {
        Ok(BotSettings {
            morning_time: self.morning_time.parse::<DailyTime>()?,
            evening_time: self.evening_time.parse::<DailyTime>()?,
            timezone: parse_timezone(&self.timezone)?,
        })
    }
}
