//! # Entry Store
//!
//! Persistence seam of the journal. Every operation is scoped to one chat id
//! except [`EntryStore::chat_ids`], which the reminder job uses.
//!
//! Implementations must keep at most one `Ongoing` entry per chat, even when
//! two messages of the same chat race: [`EntryStore::ongoing_or_create`] and
//! [`EntryStore::append_to_ongoing`] are atomic per chat id.

use anyhow::Result;
use chrono::{DateTime, Utc};
use std::future::Future;
use tokio::sync::Mutex;
use tracing::debug;

use crate::entry::{join_fragment, EntryStatus, JournalEntry};

pub trait EntryStore: Send + Sync {
    /// Find the chat's ongoing entry, creating an empty one when there is
    /// none. The flag is true when the entry was created by this call.
    fn ongoing_or_create(&self, chat_id: &str) -> impl Future<Output = Result<(JournalEntry, bool)>> + Send;

    fn find_ongoing(&self, chat_id: &str) -> impl Future<Output = Result<Option<JournalEntry>>> + Send;

    /// Append text to the ongoing entry, creating it when missing. The flag
    /// is true when the entry was created by this call.
    fn append_to_ongoing(
        &self,
        chat_id: &str,
        fragment: &str,
    ) -> impl Future<Output = Result<(JournalEntry, bool)>> + Send;

    /// Mark an ongoing entry done with its mood and summary. Returns false
    /// when the entry is missing or no longer ongoing.
    fn finalize(
        &self,
        entry_id: i64,
        mood: &str,
        summary: &str,
    ) -> impl Future<Output = Result<bool>> + Send;

    /// Latest done entries, newest first
    fn recent_done(&self, chat_id: &str, limit: i64) -> impl Future<Output = Result<Vec<JournalEntry>>> + Send;

    /// Entries created in `[from, until)`, oldest first
    fn entries_between(
        &self,
        chat_id: &str,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<JournalEntry>>> + Send;

    /// Entries whose content contains `keyword` ignoring case, newest first
    fn search(
        &self,
        chat_id: &str,
        keyword: &str,
        limit: i64,
    ) -> impl Future<Output = Result<Vec<JournalEntry>>> + Send;

    /// Every chat id that has at least one entry
    fn chat_ids(&self) -> impl Future<Output = Result<Vec<String>>> + Send;
}

#[derive(Debug, Default)]
struct MemoryState {
    entries: Vec<JournalEntry>,
    next_id: i64,
}

impl MemoryState {
    fn ongoing_index(&self, chat_id: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.chat_id == chat_id && e.status == EntryStatus::Ongoing)
    }

    fn ongoing_or_create(&mut self, chat_id: &str) -> (usize, bool) {
        if let Some(index) = self.ongoing_index(chat_id) {
            return (index, false);
        }

        self.next_id += 1;
        let now = Utc::now();
        self.entries.push(JournalEntry {
            id: self.next_id,
            chat_id: chat_id.to_string(),
            content: String::new(),
            mood: None,
            summary: None,
            status: EntryStatus::Ongoing,
            created_at: now,
            updated_at: now,
        });
        debug!(chat_id = %chat_id, entry_id = self.next_id, "Created ongoing entry in memory");
        (self.entries.len() - 1, true)
    }
}

/// Entry store kept in process memory. Used when no database is configured
/// and in tests. A single mutex makes every operation atomic.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from existing entries, e.g. ones dated in the past
    pub fn with_entries(entries: Vec<JournalEntry>) -> Self {
        let next_id = entries.iter().map(|e| e.id).max().unwrap_or(0);
        Self {
            state: Mutex::new(MemoryState { entries, next_id }),
        }
    }

    /// Snapshot of every stored entry
    pub async fn all(&self) -> Vec<JournalEntry> {
        self.state.lock().await.entries.clone()
    }
}

fn limit_to_usize(limit: i64) -> usize {
    usize::try_from(limit).unwrap_or(0)
}

impl EntryStore for MemoryStore {
    async fn ongoing_or_create(&self, chat_id: &str) -> Result<(JournalEntry, bool)> {
        let mut state = self.state.lock().await;
        let (index, created) = state.ongoing_or_create(chat_id);
        Ok((state.entries[index].clone(), created))
    }

    async fn find_ongoing(&self, chat_id: &str) -> Result<Option<JournalEntry>> {
        let state = self.state.lock().await;
        Ok(state.ongoing_index(chat_id).map(|i| state.entries[i].clone()))
    }

    async fn append_to_ongoing(&self, chat_id: &str, fragment: &str) -> Result<(JournalEntry, bool)> {
        let mut state = self.state.lock().await;
        let (index, created) = state.ongoing_or_create(chat_id);
        let entry = &mut state.entries[index];
        entry.content = join_fragment(&entry.content, fragment);
        entry.updated_at = Utc::now();
        Ok((entry.clone(), created))
    }

    async fn finalize(&self, entry_id: i64, mood: &str, summary: &str) -> Result<bool> {
        let mut state = self.state.lock().await;
        match state
            .entries
            .iter_mut()
            .find(|e| e.id == entry_id && e.status == EntryStatus::Ongoing)
        {
            Some(entry) => {
                entry.status = EntryStatus::Done;
                entry.mood = Some(mood.to_string());
                entry.summary = Some(summary.to_string());
                entry.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn recent_done(&self, chat_id: &str, limit: i64) -> Result<Vec<JournalEntry>> {
        let state = self.state.lock().await;
        let mut entries: Vec<JournalEntry> = state
            .entries
            .iter()
            .filter(|e| e.chat_id == chat_id && e.status == EntryStatus::Done)
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        entries.truncate(limit_to_usize(limit));
        Ok(entries)
    }

    async fn entries_between(
        &self,
        chat_id: &str,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<JournalEntry>> {
        let state = self.state.lock().await;
        let mut entries: Vec<JournalEntry> = state
            .entries
            .iter()
            .filter(|e| e.chat_id == chat_id && e.created_at >= from && e.created_at < until)
            .cloned()
            .collect();
        entries.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(entries)
    }

    async fn search(&self, chat_id: &str, keyword: &str, limit: i64) -> Result<Vec<JournalEntry>> {
        let needle = keyword.to_lowercase();
        let state = self.state.lock().await;
        let mut entries: Vec<JournalEntry> = state
            .entries
            .iter()
            .filter(|e| e.chat_id == chat_id && e.content.to_lowercase().contains(&needle))
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        entries.truncate(limit_to_usize(limit));
        Ok(entries)
    }

    async fn chat_ids(&self) -> Result<Vec<String>> {
        let state = self.state.lock().await;
        let mut ids: Vec<String> = state.entries.iter().map(|e| e.chat_id.clone()).collect();
        ids.sort();
        ids.dedup();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_ongoing_or_create_is_idempotent() -> Result<()> {
        let store = MemoryStore::new();

        let (first, created) = store.ongoing_or_create("42").await?;
        assert!(created);
        let (second, created_again) = store.ongoing_or_create("42").await?;
        assert!(!created_again);
        assert_eq!(first.id, second.id);

        Ok(())
    }

    #[tokio::test]
    async fn test_concurrent_appends_share_one_ongoing_entry() -> Result<()> {
        let store = Arc::new(MemoryStore::new());

        let mut handles = Vec::new();
        for i in 0..20 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.append_to_ongoing("42", &format!("message {i}")).await
            }));
        }
        for handle in handles {
            handle.await??;
        }

        let entries = store.all().await;
        let ongoing: Vec<_> = entries.iter().filter(|e| e.is_ongoing()).collect();
        assert_eq!(ongoing.len(), 1);
        assert_eq!(ongoing[0].content.lines().count(), 20);

        Ok(())
    }

    #[tokio::test]
    async fn test_finalize_only_touches_ongoing_entries() -> Result<()> {
        let store = MemoryStore::new();
        let (entry, _) = store.append_to_ongoing("42", "Walked by the sea").await?;

        assert!(store.finalize(entry.id, "Calm", "You walked by the sea.").await?);
        assert!(!store.finalize(entry.id, "Other", "Other").await?);
        assert!(!store.finalize(9999, "Calm", "Nothing").await?);

        let saved = &store.all().await[0];
        assert_eq!(saved.status, EntryStatus::Done);
        assert_eq!(saved.mood.as_deref(), Some("Calm"));
        assert!(store.find_ongoing("42").await?.is_none());

        Ok(())
    }

    #[tokio::test]
    async fn test_queries_are_scoped_to_chat() -> Result<()> {
        let store = MemoryStore::new();
        store.append_to_ongoing("1", "coffee with Sam").await?;
        store.append_to_ongoing("2", "coffee alone").await?;

        let results = store.search("1", "COFFEE", 10).await?;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chat_id, "1");

        assert_eq!(store.chat_ids().await?, vec!["1".to_string(), "2".to_string()]);

        Ok(())
    }
}
