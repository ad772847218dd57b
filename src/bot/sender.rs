//! Outbound messages to Telegram, paced to stay under the Bot API limits.
//!
//! Every send first reserves a slot: at least `per_chat_interval` after the
//! previous slot of the same chat and `global_interval` after the previous
//! slot of any chat. The reservation is made under the lock, the wait
//! happens outside it.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use teloxide::prelude::*;
use teloxide::types::ParseMode;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::PacingConfig;
use crate::formatter::{markdown_to_html, Reply};
use crate::journal::Outbox;

/// Send-slot scheduler
#[derive(Debug)]
pub struct Pacer {
    per_chat_interval: Duration,
    global_interval: Duration,
    next_global: Option<Instant>,
    next_per_chat: HashMap<String, Instant>,
}

impl Pacer {
    pub fn new(per_chat_interval: Duration, global_interval: Duration) -> Self {
        Self {
            per_chat_interval,
            global_interval,
            next_global: None,
            next_per_chat: HashMap::new(),
        }
    }

    /// Reserve the next slot for `chat_id` and return when it starts
    pub fn reserve(&mut self, chat_id: &str, now: Instant) -> Instant {
        // Chats whose next slot already passed need no bookkeeping
        self.next_per_chat.retain(|_, next| *next > now);

        let mut slot = now;
        if let Some(next) = self.next_global {
            slot = slot.max(next);
        }
        if let Some(next) = self.next_per_chat.get(chat_id) {
            slot = slot.max(*next);
        }

        self.next_global = Some(slot + self.global_interval);
        self.next_per_chat
            .insert(chat_id.to_string(), slot + self.per_chat_interval);
        slot
    }

    /// Chats with a pending reservation
    pub fn tracked_chats(&self) -> usize {
        self.next_per_chat.len()
    }
}

/// [`Outbox`] that sends through the Bot API
pub struct TelegramSender {
    bot: Bot,
    pacer: Mutex<Pacer>,
}

impl TelegramSender {
    pub fn new(bot: Bot, pacing: &PacingConfig) -> Self {
        Self {
            bot,
            pacer: Mutex::new(Pacer::new(pacing.per_chat_interval, pacing.global_interval)),
        }
    }

    async fn wait_for_slot(&self, chat_id: &str) {
        let slot = {
            let mut pacer = self.pacer.lock().unwrap_or_else(PoisonError::into_inner);
            pacer.reserve(chat_id, Instant::now())
        };
        tokio::time::sleep_until(slot).await;
    }
}

impl Outbox for TelegramSender {
    async fn send(&self, chat_id: &str, reply: Reply) -> Result<()> {
        let chat = ChatId(
            chat_id
                .parse::<i64>()
                .with_context(|| format!("Invalid Telegram chat id: {chat_id}"))?,
        );

        self.wait_for_slot(chat_id).await;

        if reply.rich {
            match self
                .bot
                .send_message(chat, markdown_to_html(&reply.text))
                .parse_mode(ParseMode::Html)
                .await
            {
                Ok(_) => {
                    debug!(chat_id = %chat_id, chars = reply.text.len(), "Rich message sent");
                    return Ok(());
                }
                Err(e) => {
                    // Usually markup Telegram refuses to parse; the plain text still goes out
                    warn!(chat_id = %chat_id, error = %e, "Rich message rejected, sending as plain text");
                    self.wait_for_slot(chat_id).await;
                }
            }
        }

        self.bot
            .send_message(chat, reply.text)
            .await
            .with_context(|| format!("Failed to send message to chat {chat_id}"))?;
        debug!(chat_id = %chat_id, "Message sent");
        Ok(())
    }
}
