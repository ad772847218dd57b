//! # Configuration Module
//!
//! Settings come from environment variables (a `.env` file is loaded first by
//! the binary). Everything except the two API tokens has a default.

use anyhow::{anyhow, Context, Result};
use chrono::NaiveTime;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

// Constants for configuration defaults
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_WEBHOOK_ADDR: &str = "0.0.0.0:8443";
pub const DEFAULT_REMINDER_TIME: &str = "20:00";
pub const DEFAULT_PER_CHAT_INTERVAL_MS: u64 = 1000; // Telegram: about one message per second per chat
pub const DEFAULT_GLOBAL_INTERVAL_MS: u64 = 35; // Telegram: about 30 messages per second overall
pub const DEFAULT_RECENT_ENTRIES_LIMIT: i64 = 5;
pub const DEFAULT_SEARCH_RESULTS_LIMIT: i64 = 10;

/// Chat-completion endpoint settings
#[derive(Debug, Clone)]
pub struct AssistantConfig {
    pub api_key: String,
    pub model: String,
    /// Base URL of an OpenAI-compatible API, without the `/chat/completions` suffix
    pub base_url: String,
}

/// Webhook transport settings; absent means long polling
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    /// Public URL Telegram posts updates to
    pub url: reqwest::Url,
    /// Local address the webhook server binds to
    pub addr: SocketAddr,
}

/// Daily reminder settings
#[derive(Debug, Clone)]
pub struct ReminderConfig {
    pub enabled: bool,
    /// Time of day (UTC) the reminder goes out
    pub time: NaiveTime,
}

/// Spacing between outbound messages
#[derive(Debug, Clone)]
pub struct PacingConfig {
    /// Minimum gap between two messages to the same chat
    pub per_chat_interval: Duration,
    /// Minimum gap between any two messages
    pub global_interval: Duration,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            per_chat_interval: Duration::from_millis(DEFAULT_PER_CHAT_INTERVAL_MS),
            global_interval: Duration::from_millis(DEFAULT_GLOBAL_INTERVAL_MS),
        }
    }
}

/// Limits applied by the journal commands
#[derive(Debug, Clone)]
pub struct JournalSettings {
    /// Entries shown by `/entries`
    pub recent_entries_limit: i64,
    /// Entries shown by `/search`
    pub search_results_limit: i64,
}

impl Default for JournalSettings {
    fn default() -> Self {
        Self {
            recent_entries_limit: DEFAULT_RECENT_ENTRIES_LIMIT,
            search_results_limit: DEFAULT_SEARCH_RESULTS_LIMIT,
        }
    }
}

/// Complete application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub telegram_bot_token: String,
    /// Postgres URL; without it entries are kept in memory
    pub database_url: Option<String>,
    pub assistant: AssistantConfig,
    pub webhook: Option<WebhookConfig>,
    pub reminder: ReminderConfig,
    pub pacing: PacingConfig,
    pub journal: JournalSettings,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from any key/value source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let required = |key: &str| var(key).ok_or_else(|| anyhow!("{key} must be set"));

        let webhook = match var("WEBHOOK_URL") {
            Some(url) => Some(WebhookConfig {
                url: url.parse().with_context(|| format!("WEBHOOK_URL is not a valid URL: {url}"))?,
                addr: parse_or(var("WEBHOOK_ADDR"), DEFAULT_WEBHOOK_ADDR, "WEBHOOK_ADDR")?,
            }),
            None => None,
        };

        let reminder_time = var("REMINDER_TIME").unwrap_or_else(|| DEFAULT_REMINDER_TIME.to_string());

        Ok(Self {
            telegram_bot_token: required("TELEGRAM_BOT_TOKEN")?,
            database_url: var("DATABASE_URL"),
            assistant: AssistantConfig {
                api_key: required("OPENAI_API_KEY")?,
                model: var("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
                base_url: var("OPENAI_BASE_URL").unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
            },
            webhook,
            reminder: ReminderConfig {
                enabled: match var("REMINDER_ENABLED") {
                    Some(raw) => parse_bool(&raw).context("REMINDER_ENABLED")?,
                    None => true,
                },
                time: parse_time_of_day(&reminder_time).context("REMINDER_TIME")?,
            },
            pacing: PacingConfig {
                per_chat_interval: Duration::from_millis(parse_or(
                    var("PER_CHAT_INTERVAL_MS"),
                    DEFAULT_PER_CHAT_INTERVAL_MS,
                    "PER_CHAT_INTERVAL_MS",
                )?),
                global_interval: Duration::from_millis(parse_or(
                    var("GLOBAL_INTERVAL_MS"),
                    DEFAULT_GLOBAL_INTERVAL_MS,
                    "GLOBAL_INTERVAL_MS",
                )?),
            },
            journal: JournalSettings {
                recent_entries_limit: parse_limit(
                    var("RECENT_ENTRIES_LIMIT"),
                    DEFAULT_RECENT_ENTRIES_LIMIT,
                    "RECENT_ENTRIES_LIMIT",
                )?,
                search_results_limit: parse_limit(
                    var("SEARCH_RESULTS_LIMIT"),
                    DEFAULT_SEARCH_RESULTS_LIMIT,
                    "SEARCH_RESULTS_LIMIT",
                )?,
            },
        })
    }
}

fn parse_or<T, D>(raw: Option<String>, default: D, key: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    D: ToString,
{
    let raw = raw.unwrap_or_else(|| default.to_string());
    raw.parse::<T>()
        .map_err(|e| anyhow!("{key} has an invalid value {raw:?}: {e}"))
}

/// Row limits are SQL `LIMIT` values, so negatives are rejected here
fn parse_limit(raw: Option<String>, default: i64, key: &str) -> Result<i64> {
    parse_or::<u32, _>(raw, default, key).map(i64::from)
}

fn parse_bool(raw: &str) -> Result<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(anyhow!("expected a boolean, got {other:?}")),
    }
}

/// Parse `HH:MM` (24-hour clock)
pub fn parse_time_of_day(raw: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M")
        .with_context(|| format!("expected HH:MM, got {raw:?}"))
}
