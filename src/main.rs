use anyhow::{Context, Result};
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::update_listeners::webhooks;
use tracing::{info, warn};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

use journal_bot::assistant::{Assistant, OpenAiClient};
use journal_bot::bot::{self, TelegramSender};
use journal_bot::config::Config;
use journal_bot::db::{self, PgStore};
use journal_bot::journal::Journal;
use journal_bot::localization::init_localization;
use journal_bot::reminder::spawn_daily_reminder;
use journal_bot::store::{EntryStore, MemoryStore};

/// Human-readable logs by default, JSON lines when `LOG_FORMAT=json`
fn init_tracing() {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    let json = std::env::var("LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    init_tracing();
    info!("Starting Journal Telegram Bot");

    let config = Config::from_env()?;
    init_localization()?;

    let assistant = OpenAiClient::new(config.assistant.clone());
    info!(model = %config.assistant.model, endpoint = %assistant.endpoint(), "Assistant configured");

    match config.database_url.clone() {
        Some(database_url) => {
            let pool = db::connect(&database_url).await?;
            db::init_database_schema(&pool).await?;
            run(config, PgStore::new(pool), assistant).await
        }
        None => {
            warn!("DATABASE_URL not set, entries are kept in memory and lost on restart");
            run(config, MemoryStore::new(), assistant).await
        }
    }
}

async fn run<S, A>(config: Config, store: S, assistant: A) -> Result<()>
where
    S: EntryStore + 'static,
    A: Assistant + 'static,
{
    let bot = Bot::new(&config.telegram_bot_token);
    let journal = Arc::new(Journal::new(store, assistant, config.journal.clone()));
    let sender = Arc::new(TelegramSender::new(bot.clone(), &config.pacing));

    if config.reminder.enabled {
        info!(time = %config.reminder.time, "Daily reminder enabled");
        spawn_daily_reminder(Arc::clone(&journal), Arc::clone(&sender), config.reminder.time);
    }

    let handler = dptree::entry().branch(Update::filter_message().endpoint({
        let journal = Arc::clone(&journal);
        let sender = Arc::clone(&sender);
        move |msg: Message| {
            let journal = Arc::clone(&journal);
            let sender = Arc::clone(&sender);
            async move { bot::message_handler(msg, journal, sender).await }
        }
    }));

    let mut dispatcher = Dispatcher::builder(bot.clone(), handler)
        .enable_ctrlc_handler()
        .build();

    match config.webhook {
        Some(webhook) => {
            info!(url = %webhook.url, addr = %webhook.addr, "Bot initialized, starting webhook dispatcher");
            let listener = webhooks::axum(bot, webhooks::Options::new(webhook.addr, webhook.url))
                .await
                .context("Failed to set up webhook")?;
            dispatcher
                .dispatch_with_listener(
                    listener,
                    LoggingErrorHandler::with_custom_text("An error from the update listener"),
                )
                .await;
        }
        None => {
            info!("Bot initialized, starting long polling dispatcher");
            dispatcher.dispatch().await;
        }
    }

    Ok(())
}
