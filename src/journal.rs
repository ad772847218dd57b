//! # Journal
//!
//! The per-chat session state machine and the command handlers.
//!
//! A chat is either without a session or has exactly one ongoing entry. Text
//! that is not a command goes into the ongoing entry (creating it when
//! needed). `/done` generates a mood and a summary and closes the entry; a
//! closed entry is never reopened.
//!
//! Handlers read through an [`EntryStore`], call the [`Assistant`] and write
//! replies to an [`Outbox`]. They know nothing about Telegram.

use anyhow::{anyhow, Result};
use chrono::{Datelike, NaiveDate, Utc};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::assistant::{split_analysis, Assistant};
use crate::commands::{Command, PeriodArgs};
use crate::config::JournalSettings;
use crate::entry::JournalEntry;
use crate::formatter::{
    chunk_message, format_date, format_entry_list, Reply, MAX_MESSAGE_CHARS,
};
use crate::localization::{t_args_lang, t_lang};
use crate::period::Period;
use crate::store::EntryStore;
use crate::text_analysis::{render_word_counts, tally_labels, top_words, RECAP_WORDS, WORDCLOUD_SIZE};

/// Where replies go. The Telegram implementation paces and renders them.
pub trait Outbox: Send + Sync {
    fn send(&self, chat_id: &str, reply: Reply) -> impl Future<Output = Result<()>> + Send;
}

/// Session of one chat as seen by the state machine
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    NoSession,
    Ongoing(JournalEntry),
}

pub struct Journal<S, A> {
    store: S,
    assistant: A,
    settings: JournalSettings,
    /// Last language code seen per chat, for messages sent unprompted.
    /// Kept in memory; after a restart the reminder falls back to English
    /// until the chat writes again.
    languages: Mutex<HashMap<String, String>>,
}

impl<S: EntryStore, A: Assistant> Journal<S, A> {
    pub fn new(store: S, assistant: A, settings: JournalSettings) -> Self {
        Self {
            store,
            assistant,
            settings,
            languages: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn session_state(&self, chat_id: &str) -> Result<SessionState> {
        Ok(match self.store.find_ongoing(chat_id).await? {
            Some(entry) => SessionState::Ongoing(entry),
            None => SessionState::NoSession,
        })
    }

    /// Handle one inbound text message
    pub async fn handle<O: Outbox>(
        &self,
        outbox: &O,
        chat_id: &str,
        text: &str,
        language_code: Option<&str>,
    ) -> Result<()> {
        self.handle_on(outbox, chat_id, text, language_code, Utc::now().date_naive())
            .await
    }

    /// Like [`Journal::handle`] with an explicit current date for period
    /// defaults
    pub async fn handle_on<O: Outbox>(
        &self,
        outbox: &O,
        chat_id: &str,
        text: &str,
        language_code: Option<&str>,
        today: NaiveDate,
    ) -> Result<()> {
        let command = Command::parse(text);
        info!(chat_id = %chat_id, command = command.name(), "Handling message");

        if let Some(code) = language_code {
            self.languages
                .lock()
                .await
                .insert(chat_id.to_string(), code.to_string());
        }

        let ctx = ChatContext {
            outbox,
            chat_id,
            language_code,
        };

        match command {
            Command::Start => ctx.say(t_lang("welcome", language_code)).await,
            Command::Add => self.start_entry(&ctx).await,
            Command::Text(text) => self.append_text(&ctx, &text).await,
            Command::Done => self.finish_entry(&ctx).await,
            Command::Entries => self.recent_entries(&ctx).await,
            Command::Moods(args) => self.moods(&ctx, &args, today).await,
            Command::Summaries(args) => self.summaries(&ctx, &args, today).await,
            Command::Search(keyword) => self.search(&ctx, keyword.as_deref()).await,
            Command::Recap(args) => self.recap(&ctx, &args, today).await,
            Command::WordCloud(args) => self.word_cloud(&ctx, &args, today).await,
            Command::Analyze(question) => self.analyze(&ctx, question.as_deref(), today).await,
        }
    }

    /// Send the reminder to every chat with at least one entry. Returns how
    /// many chats were reached; failures for one chat do not stop the rest.
    pub async fn send_daily_reminder<O: Outbox>(&self, outbox: &O) -> Result<usize> {
        let chat_ids = self.store.chat_ids().await?;
        info!(chats = chat_ids.len(), "Sending daily reminder");

        let languages = self.languages.lock().await.clone();

        let mut delivered = 0;
        for chat_id in &chat_ids {
            let language_code = languages.get(chat_id).map(String::as_str);
            match outbox
                .send(chat_id, Reply::plain(t_lang("daily-reminder", language_code)))
                .await
            {
                Ok(()) => delivered += 1,
                Err(e) => warn!(chat_id = %chat_id, error = %e, "Failed to send reminder"),
            }
        }

        info!(delivered, "Daily reminder sent");
        Ok(delivered)
    }

    async fn start_entry<O: Outbox>(&self, ctx: &ChatContext<'_, O>) -> Result<()> {
        let (entry, created) = self.store.ongoing_or_create(ctx.chat_id).await?;
        debug!(chat_id = %ctx.chat_id, entry_id = entry.id, created, "Add command");

        let key = if created {
            "entry-started"
        } else {
            "entry-already-ongoing"
        };
        ctx.say(t_lang(key, ctx.language_code)).await
    }

    async fn append_text<O: Outbox>(&self, ctx: &ChatContext<'_, O>, text: &str) -> Result<()> {
        if text.is_empty() {
            return ctx.say(t_lang("empty-message", ctx.language_code)).await;
        }

        let (entry, created) = self.store.append_to_ongoing(ctx.chat_id, text).await?;
        debug!(
            chat_id = %ctx.chat_id,
            entry_id = entry.id,
            content_chars = entry.content.len(),
            "Text appended"
        );

        let key = if created {
            "entry-started-implicit"
        } else {
            "entry-appended"
        };
        ctx.say(t_lang(key, ctx.language_code)).await
    }

    async fn finish_entry<O: Outbox>(&self, ctx: &ChatContext<'_, O>) -> Result<()> {
        let entry = match self.store.find_ongoing(ctx.chat_id).await? {
            Some(entry) if entry.has_content() => entry,
            _ => return ctx.say(t_lang("nothing-to-save", ctx.language_code)).await,
        };

        ctx.say(t_lang("entry-saving", ctx.language_code)).await?;

        // Both calls happen before any state change: a failure leaves the
        // entry ongoing
        let mood = self.assistant.mood(&entry.content).await?;
        let summary = self.assistant.summary(&entry.content).await?;

        if !self.store.finalize(entry.id, &mood, &summary).await? {
            warn!(chat_id = %ctx.chat_id, entry_id = entry.id, "Entry was closed while saving");
            return ctx.say(t_lang("nothing-to-save", ctx.language_code)).await;
        }

        info!(chat_id = %ctx.chat_id, entry_id = entry.id, mood = %mood, "Entry saved");
        ctx.say(t_args_lang("entry-saved", &[("mood", mood.as_str())], ctx.language_code))
            .await
    }

    async fn recent_entries<O: Outbox>(&self, ctx: &ChatContext<'_, O>) -> Result<()> {
        let entries = self
            .store
            .recent_done(ctx.chat_id, self.settings.recent_entries_limit)
            .await?;

        if entries.is_empty() {
            return ctx.say(t_lang("no-entries", ctx.language_code)).await;
        }

        let title = t_lang("recent-title", ctx.language_code);
        ctx.say_long(&format_entry_list(&title, &entries, ctx.language_code))
            .await
    }

    async fn moods<O: Outbox>(&self, ctx: &ChatContext<'_, O>, args: &PeriodArgs, today: NaiveDate) -> Result<()> {
        let Some(period) = ctx.resolve_period(args, today).await? else {
            return Ok(());
        };
        let label = period.label();

        let lines: Vec<String> = self
            .entries_in(ctx.chat_id, &period)
            .await?
            .iter()
            .filter(|e| !e.is_ongoing())
            .filter_map(|e| {
                e.mood
                    .as_deref()
                    .filter(|m| !m.trim().is_empty())
                    .map(|mood| format!("{}: {}", format_date(&e.created_at), mood))
            })
            .collect();

        if lines.is_empty() {
            return ctx
                .say(t_args_lang("no-moods", &[("period", label.as_str())], ctx.language_code))
                .await;
        }

        let title = t_args_lang("moods-title", &[("period", label.as_str())], ctx.language_code);
        ctx.say_long(&format!("{title}\n{}", lines.join("\n"))).await
    }

    async fn summaries<O: Outbox>(
        &self,
        ctx: &ChatContext<'_, O>,
        args: &PeriodArgs,
        today: NaiveDate,
    ) -> Result<()> {
        let Some(period) = ctx.resolve_period(args, today).await? else {
            return Ok(());
        };
        let label = period.label();

        let summaries: Vec<(String, String)> = self
            .entries_in(ctx.chat_id, &period)
            .await?
            .into_iter()
            .filter(|e| !e.is_ongoing())
            .filter_map(|e| {
                let date = format_date(&e.created_at);
                e.summary
                    .filter(|s| !s.trim().is_empty())
                    .map(|summary| (date, summary))
            })
            .collect();

        if summaries.is_empty() {
            return ctx
                .say(t_args_lang("no-summaries", &[("period", label.as_str())], ctx.language_code))
                .await;
        }

        ctx.say(t_args_lang("summaries-title", &[("period", label.as_str())], ctx.language_code))
            .await?;
        for (date, summary) in &summaries {
            ctx.say_long(&format!("{date}\n{summary}")).await?;
        }
        Ok(())
    }

    async fn search<O: Outbox>(&self, ctx: &ChatContext<'_, O>, keyword: Option<&str>) -> Result<()> {
        let Some(keyword) = keyword else {
            return ctx.say(t_lang("search-usage", ctx.language_code)).await;
        };

        let entries = self
            .store
            .search(ctx.chat_id, keyword, self.settings.search_results_limit)
            .await?;
        info!(chat_id = %ctx.chat_id, results = entries.len(), "Search");

        if entries.is_empty() {
            return ctx
                .say(t_args_lang("no-search-results", &[("keyword", keyword)], ctx.language_code))
                .await;
        }

        let title = t_args_lang("search-title", &[("keyword", keyword)], ctx.language_code);
        ctx.say_long(&format_entry_list(&title, &entries, ctx.language_code))
            .await
    }

    async fn recap<O: Outbox>(&self, ctx: &ChatContext<'_, O>, args: &PeriodArgs, today: NaiveDate) -> Result<()> {
        let Some(period) = ctx.resolve_period(args, today).await? else {
            return Ok(());
        };
        let label = period.label();

        let entries: Vec<JournalEntry> = self
            .entries_in(ctx.chat_id, &period)
            .await?
            .into_iter()
            .filter(JournalEntry::has_content)
            .collect();

        if entries.is_empty() {
            return ctx
                .say(t_args_lang("no-entries-period", &[("period", label.as_str())], ctx.language_code))
                .await;
        }

        let days: HashSet<NaiveDate> = entries.iter().map(|e| e.created_at.date_naive()).collect();
        let moods = tally_labels(entries.iter().filter_map(|e| e.mood.as_deref()));
        let words = top_words(&corpus(&entries), RECAP_WORDS);

        let entry_count = entries.len().to_string();
        let day_count = days.len().to_string();
        let mut sections = vec![
            t_args_lang("recap-title", &[("period", label.as_str())], ctx.language_code),
            t_args_lang(
                "recap-stats",
                &[("entries", entry_count.as_str()), ("days", day_count.as_str())],
                ctx.language_code,
            ),
        ];
        if !moods.is_empty() {
            sections.push(format!(
                "{}\n{}",
                t_lang("recap-moods", ctx.language_code),
                render_word_counts(&moods)
            ));
        }
        if !words.is_empty() {
            sections.push(format!(
                "{}\n{}",
                t_lang("recap-words", ctx.language_code),
                render_word_counts(&words)
            ));
        }

        ctx.say_long(&sections.join("\n\n")).await
    }

    async fn word_cloud<O: Outbox>(
        &self,
        ctx: &ChatContext<'_, O>,
        args: &PeriodArgs,
        today: NaiveDate,
    ) -> Result<()> {
        let Some(period) = ctx.resolve_period(args, today).await? else {
            return Ok(());
        };
        let label = period.label();

        let entries = self.entries_in(ctx.chat_id, &period).await?;
        let words = top_words(&corpus(&entries), WORDCLOUD_SIZE);

        if words.is_empty() {
            return ctx
                .say(t_args_lang("no-entries-period", &[("period", label.as_str())], ctx.language_code))
                .await;
        }

        let title = t_args_lang("wordcloud-title", &[("period", label.as_str())], ctx.language_code);
        ctx.say_long(&format!("{title}\n{}", render_word_counts(&words)))
            .await
    }

    async fn analyze<O: Outbox>(
        &self,
        ctx: &ChatContext<'_, O>,
        question: Option<&str>,
        today: NaiveDate,
    ) -> Result<()> {
        let year = today.year();
        let period = Period::year(year).ok_or_else(|| anyhow!("Year {year} is out of range"))?;
        let year_label = year.to_string();

        let entries: Vec<JournalEntry> = self
            .entries_in(ctx.chat_id, &period)
            .await?
            .into_iter()
            .filter(JournalEntry::has_content)
            .collect();

        if entries.is_empty() {
            return ctx
                .say(t_args_lang("no-entries-year", &[("year", year_label.as_str())], ctx.language_code))
                .await;
        }

        ctx.say(t_args_lang("analyze-working", &[("year", year_label.as_str())], ctx.language_code))
            .await?;

        let question = match question {
            Some(question) => question.to_string(),
            None => t_lang("analyze-default-question", ctx.language_code),
        };
        info!(chat_id = %ctx.chat_id, entries = entries.len(), "Requesting year in review");

        let answer = self
            .assistant
            .review_year(&review_corpus(&entries), &question)
            .await?;

        for section in split_analysis(&answer) {
            for chunk in chunk_message(&section, MAX_MESSAGE_CHARS) {
                ctx.outbox.send(ctx.chat_id, Reply::auto(chunk)).await?;
            }
        }
        Ok(())
    }

    async fn entries_in(&self, chat_id: &str, period: &Period) -> Result<Vec<JournalEntry>> {
        let (from, until) = period.bounds();
        self.store.entries_between(chat_id, from, until).await
    }
}

/// Who a handler is answering
struct ChatContext<'a, O> {
    outbox: &'a O,
    chat_id: &'a str,
    language_code: Option<&'a str>,
}

impl<O: Outbox> ChatContext<'_, O> {
    async fn say(&self, text: String) -> Result<()> {
        self.outbox.send(self.chat_id, Reply::plain(text)).await
    }

    /// Send plain text, split over several messages when too long
    async fn say_long(&self, text: &str) -> Result<()> {
        for chunk in chunk_message(text, MAX_MESSAGE_CHARS) {
            self.outbox.send(self.chat_id, Reply::plain(chunk)).await?;
        }
        Ok(())
    }

    /// Resolve the period arguments, telling the user when they are invalid
    async fn resolve_period(&self, args: &PeriodArgs, today: NaiveDate) -> Result<Option<Period>> {
        match Period::resolve(args.month.as_deref(), args.year.as_deref(), today) {
            Ok(period) => Ok(Some(period)),
            Err(e) => {
                debug!(chat_id = %self.chat_id, error = %e, "Invalid period");
                let input = period_input(args);
                self.say(t_args_lang("invalid-period", &[("input", input.as_str())], self.language_code))
                    .await?;
                Ok(None)
            }
        }
    }
}

fn period_input(args: &PeriodArgs) -> String {
    [args.month.as_deref(), args.year.as_deref()]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ")
}

fn corpus(entries: &[JournalEntry]) -> String {
    entries
        .iter()
        .map(|e| e.content.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

/// One paragraph per entry: `YYYY-MM-DD (mood): content`
fn review_corpus(entries: &[JournalEntry]) -> String {
    entries
        .iter()
        .map(|e| match e.mood.as_deref() {
            Some(mood) => format!("{} ({}): {}", format_date(&e.created_at), mood, e.content.trim()),
            None => format!("{}: {}", format_date(&e.created_at), e.content.trim()),
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
