//! Message Handler module for incoming Telegram messages

use anyhow::Result;
use std::sync::Arc;
use teloxide::prelude::*;
use tracing::debug;

use crate::assistant::Assistant;
use crate::formatter::Reply;
use crate::journal::{Journal, Outbox};
use crate::localization::t_lang;
use crate::store::EntryStore;

use super::sender::TelegramSender;

/// Route one Telegram message to the journal. Only text is journaled.
pub async fn message_handler<S, A>(
    msg: Message,
    journal: Arc<Journal<S, A>>,
    sender: Arc<TelegramSender>,
) -> Result<()>
where
    S: EntryStore,
    A: Assistant,
{
    let chat_id = msg.chat.id.0.to_string();
    let language_code = msg.from.as_ref().and_then(|user| user.language_code.as_deref());

    match msg.text() {
        Some(text) => {
            journal
                .handle(sender.as_ref(), &chat_id, text, language_code)
                .await
        }
        None => handle_unsupported_message(&sender, &chat_id, language_code).await,
    }
}

async fn handle_unsupported_message(
    sender: &TelegramSender,
    chat_id: &str,
    language_code: Option<&str>,
) -> Result<()> {
    debug!(chat_id = %chat_id, "Ignoring non-text message");
    sender
        .send(chat_id, Reply::plain(t_lang("unsupported-message", language_code)))
        .await
}
