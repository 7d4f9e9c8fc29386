use std::str::FromStr;
use std::time::Duration;

use crate::{Error, Result};

/// All configuration loaded from environment variables at startup.
/// Unset variables fall back to defaults; malformed values are errors.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    // Trading
    pub symbol: String,
    pub quantity: u64,
    pub short_window: usize,
    pub long_window: usize,
    pub initial_cash_usd: f64,
    pub tick_seconds: f64,
    pub max_position_qty: u64,

    // Control API
    pub server_host: String,
    pub server_port: u16,
    pub api_token: Option<String>,

    // Telegram
    pub telegram_enabled: bool,
    pub telegram_bot_token: String,
    pub telegram_chat_id: String,
    pub telegram_commands_enabled: bool,
    pub telegram_poll_seconds: f64,
}

impl Config {
    /// Load configuration from the process environment.
    /// Loads `.env` if present unless `BOT_DISABLE_DOTENV` is set.
    pub fn from_env() -> Result<Self> {
        if !env_bool(std::env::var("BOT_DISABLE_DOTENV").ok(), false) {
            let _ = dotenvy::dotenv(); // ignore error if .env not present
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let cfg = Config {
            symbol: lookup("BOT_SYMBOL").unwrap_or_else(|| "AAPL".to_string()),
            quantity: parse_or(&lookup, "BOT_QUANTITY", 1)?,
            short_window: parse_or(&lookup, "BOT_SHORT_WINDOW", 5)?,
            long_window: parse_or(&lookup, "BOT_LONG_WINDOW", 20)?,
            initial_cash_usd: parse_or(&lookup, "BOT_INITIAL_CASH_USD", 10_000.0)?,
            tick_seconds: parse_or(&lookup, "BOT_TICK_SECONDS", 3.0)?,
            max_position_qty: parse_or(&lookup, "BOT_MAX_POSITION_QTY", 5)?,
            server_host: lookup("BOT_SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            server_port: parse_or(&lookup, "BOT_SERVER_PORT", 8080)?,
            api_token: lookup("BOT_API_TOKEN").filter(|t| !t.trim().is_empty()),
            telegram_enabled: env_bool(lookup("TELEGRAM_ENABLED"), false),
            // The misspelled aliases are accepted for older .env files.
            telegram_bot_token: first_of(&lookup, &["TELEGRAM_BOT_TOKEN", "TELEGRAM_BOT_TOKE"]),
            telegram_chat_id: first_of(&lookup, &["TELEGRAM_CHAT_ID", "TELEGERAM_CHAT_ID"]),
            telegram_commands_enabled: env_bool(lookup("TELEGRAM_COMMANDS_ENABLED"), true),
            telegram_poll_seconds: parse_or(&lookup, "TELEGRAM_POLL_SECONDS", 1.0)?,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        if !(self.tick_seconds.is_finite() && self.tick_seconds > 0.0) {
            return Err(Error::Config(format!(
                "BOT_TICK_SECONDS must be positive, got {}",
                self.tick_seconds
            )));
        }
        if !(self.telegram_poll_seconds.is_finite() && self.telegram_poll_seconds > 0.0) {
            return Err(Error::Config(format!(
                "TELEGRAM_POLL_SECONDS must be positive, got {}",
                self.telegram_poll_seconds
            )));
        }
        if self.telegram_enabled
            && (self.telegram_bot_token.is_empty() || self.telegram_chat_id.is_empty())
        {
            return Err(Error::Config(
                "telegram is enabled but TELEGRAM_BOT_TOKEN or TELEGRAM_CHAT_ID is empty".into(),
            ));
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(self.tick_seconds)
    }

    pub fn telegram_poll_interval(&self) -> Duration {
        Duration::from_secs_f64(self.telegram_poll_seconds)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("{key} has an invalid value: '{raw}'"))),
    }
}

fn env_bool(raw: Option<String>, default: bool) -> bool {
    match raw {
        None => default,
        Some(v) => matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
    }
}

fn first_of<F>(lookup: &F, keys: &[&str]) -> String
where
    F: Fn(&str) -> Option<String>,
{
    keys.iter()
        .filter_map(|key| lookup(key))
        .find(|v| !v.is_empty())
        .unwrap_or_default()
}
