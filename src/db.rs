//! # Database
//!
//! Postgres persistence for journal entries through `sqlx`. The schema keeps
//! the one-ongoing-entry-per-chat rule in a partial unique index, so racing
//! messages of one chat converge on the same row.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{debug, info};

use crate::entry::{join_fragment, EntryStatus, JournalEntry};
use crate::store::EntryStore;

const MAX_CONNECTIONS: u32 = 5;

macro_rules! entry_columns {
    () => {
        "id, chat_id, content, mood, summary, status, created_at, updated_at"
    };
}

/// Find the ongoing entry of a chat or insert an empty one. The no-op update
/// on conflict locks the existing row and makes `RETURNING` yield it.
const UPSERT_ONGOING: &str = concat!(
    "INSERT INTO journal_entries (chat_id) VALUES ($1)
     ON CONFLICT (chat_id) WHERE status = 'ongoing'
     DO UPDATE SET updated_at = journal_entries.updated_at
     RETURNING ",
    entry_columns!(),
    ", (xmax = 0) AS created"
);

#[derive(Debug, sqlx::FromRow)]
struct EntryRow {
    id: i64,
    chat_id: String,
    content: String,
    mood: Option<String>,
    summary: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct UpsertRow {
    #[sqlx(flatten)]
    entry: EntryRow,
    created: bool,
}

impl TryFrom<EntryRow> for JournalEntry {
    type Error = anyhow::Error;

    fn try_from(row: EntryRow) -> Result<Self> {
        Ok(JournalEntry {
            id: row.id,
            chat_id: row.chat_id,
            content: row.content,
            mood: row.mood,
            summary: row.summary,
            status: row.status.parse::<EntryStatus>()?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn into_entries(rows: Vec<EntryRow>) -> Result<Vec<JournalEntry>> {
    rows.into_iter().map(JournalEntry::try_from).collect()
}

/// Open a connection pool
pub async fn connect(database_url: &str) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .connect(database_url)
        .await
        .context("Failed to connect to database")
}

/// Initialize the database schema
pub async fn init_database_schema(pool: &PgPool) -> Result<()> {
    info!("Initializing database schema...");

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS journal_entries (
            id BIGSERIAL PRIMARY KEY,
            chat_id TEXT NOT NULL,
            content TEXT NOT NULL DEFAULT '',
            mood TEXT,
            summary TEXT,
            status TEXT NOT NULL DEFAULT 'ongoing' CHECK (status IN ('ongoing', 'done')),
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create journal_entries table")?;

    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS journal_entries_one_ongoing
         ON journal_entries (chat_id) WHERE status = 'ongoing'",
    )
    .execute(pool)
    .await
    .context("Failed to create ongoing entry index")?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS journal_entries_chat_created
         ON journal_entries (chat_id, created_at)",
    )
    .execute(pool)
    .await
    .context("Failed to create chat/date index")?;

    info!("Database schema initialized successfully");
    Ok(())
}

/// Get the ongoing entry of a chat, creating an empty one when missing
pub async fn get_or_create_ongoing_entry(pool: &PgPool, chat_id: &str) -> Result<(JournalEntry, bool)> {
    let row: UpsertRow = sqlx::query_as(UPSERT_ONGOING)
        .bind(chat_id)
        .fetch_one(pool)
        .await
        .context("Failed to get or create ongoing entry")?;

    if row.created {
        info!(chat_id = %chat_id, entry_id = row.entry.id, "Created ongoing entry");
    }
    Ok((JournalEntry::try_from(row.entry)?, row.created))
}

pub async fn read_ongoing_entry(pool: &PgPool, chat_id: &str) -> Result<Option<JournalEntry>> {
    let row: Option<EntryRow> = sqlx::query_as(concat!(
        "SELECT ",
        entry_columns!(),
        " FROM journal_entries WHERE chat_id = $1 AND status = 'ongoing'"
    ))
    .bind(chat_id)
    .fetch_optional(pool)
    .await
    .context("Failed to read ongoing entry")?;

    row.map(JournalEntry::try_from).transpose()
}

/// Read an entry by ID
pub async fn read_entry(pool: &PgPool, entry_id: i64) -> Result<Option<JournalEntry>> {
    let row: Option<EntryRow> = sqlx::query_as(concat!(
        "SELECT ",
        entry_columns!(),
        " FROM journal_entries WHERE id = $1"
    ))
    .bind(entry_id)
    .fetch_optional(pool)
    .await
    .context("Failed to read entry")?;

    row.map(JournalEntry::try_from).transpose()
}

/// Append a fragment to the chat's ongoing entry inside one transaction.
/// The upsert holds the row lock until commit, so appends of one chat are
/// applied one after the other.
pub async fn append_to_ongoing_entry(
    pool: &PgPool,
    chat_id: &str,
    fragment: &str,
) -> Result<(JournalEntry, bool)> {
    let mut tx = pool.begin().await.context("Failed to start transaction")?;

    let upsert: UpsertRow = sqlx::query_as(UPSERT_ONGOING)
        .bind(chat_id)
        .fetch_one(&mut *tx)
        .await
        .context("Failed to get or create ongoing entry")?;

    let content = join_fragment(&upsert.entry.content, fragment);

    let row: EntryRow = sqlx::query_as(concat!(
        "UPDATE journal_entries SET content = $1, updated_at = NOW() WHERE id = $2 RETURNING ",
        entry_columns!()
    ))
    .bind(&content)
    .bind(upsert.entry.id)
    .fetch_one(&mut *tx)
    .await
    .context("Failed to append to entry")?;

    tx.commit().await.context("Failed to commit append")?;

    debug!(
        chat_id = %chat_id,
        entry_id = row.id,
        content_chars = row.content.len(),
        created = upsert.created,
        "Appended to ongoing entry"
    );
    Ok((JournalEntry::try_from(row)?, upsert.created))
}

/// Mark an ongoing entry done. Returns false when it is missing or already done.
pub async fn finalize_entry(pool: &PgPool, entry_id: i64, mood: &str, summary: &str) -> Result<bool> {
    let rows_affected = sqlx::query(
        "UPDATE journal_entries
         SET status = 'done', mood = $2, summary = $3, updated_at = NOW()
         WHERE id = $1 AND status = 'ongoing'",
    )
    .bind(entry_id)
    .bind(mood)
    .bind(summary)
    .execute(pool)
    .await
    .context("Failed to finalize entry")?
    .rows_affected();

    if rows_affected > 0 {
        info!(entry_id, mood = %mood, "Entry finalized");
        Ok(true)
    } else {
        info!(entry_id, "No ongoing entry to finalize");
        Ok(false)
    }
}

pub async fn list_recent_done_entries(pool: &PgPool, chat_id: &str, limit: i64) -> Result<Vec<JournalEntry>> {
    let rows: Vec<EntryRow> = sqlx::query_as(concat!(
        "SELECT ",
        entry_columns!(),
        " FROM journal_entries WHERE chat_id = $1 AND status = 'done'
          ORDER BY created_at DESC, id DESC LIMIT $2"
    ))
    .bind(chat_id)
    .bind(limit)
    .fetch_all(pool)
    .await
    .context("Failed to list recent entries")?;

    into_entries(rows)
}

/// Entries created in `[from, until)`, oldest first
pub async fn list_entries_between(
    pool: &PgPool,
    chat_id: &str,
    from: DateTime<Utc>,
    until: DateTime<Utc>,
) -> Result<Vec<JournalEntry>> {
    let rows: Vec<EntryRow> = sqlx::query_as(concat!(
        "SELECT ",
        entry_columns!(),
        " FROM journal_entries WHERE chat_id = $1 AND created_at >= $2 AND created_at < $3
          ORDER BY created_at ASC, id ASC"
    ))
    .bind(chat_id)
    .bind(from)
    .bind(until)
    .fetch_all(pool)
    .await
    .context("Failed to list entries in range")?;

    into_entries(rows)
}

/// Case-insensitive substring search. `%` and `_` in the keyword match
/// themselves.
pub async fn search_entries(pool: &PgPool, chat_id: &str, keyword: &str, limit: i64) -> Result<Vec<JournalEntry>> {
    let pattern = format!("%{}%", escape_like(keyword));

    let rows: Vec<EntryRow> = sqlx::query_as(concat!(
        "SELECT ",
        entry_columns!(),
        r" FROM journal_entries WHERE chat_id = $1 AND content ILIKE $2 ESCAPE '\'
          ORDER BY created_at DESC, id DESC LIMIT $3"
    ))
    .bind(chat_id)
    .bind(&pattern)
    .bind(limit)
    .fetch_all(pool)
    .await
    .context("Failed to search entries")?;

    debug!(chat_id = %chat_id, results = rows.len(), "Search completed");
    into_entries(rows)
}

pub async fn list_chat_ids(pool: &PgPool) -> Result<Vec<String>> {
    sqlx::query_scalar::<_, String>("SELECT DISTINCT chat_id FROM journal_entries ORDER BY chat_id")
        .fetch_all(pool)
        .await
        .context("Failed to list chat ids")
}

/// Escape LIKE wildcards with a backslash
pub fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// [`EntryStore`] backed by a Postgres pool
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl EntryStore for PgStore {
    async fn ongoing_or_create(&self, chat_id: &str) -> Result<(JournalEntry, bool)> {
        get_or_create_ongoing_entry(&self.pool, chat_id).await
    }

    async fn find_ongoing(&self, chat_id: &str) -> Result<Option<JournalEntry>> {
        read_ongoing_entry(&self.pool, chat_id).await
    }

    async fn append_to_ongoing(&self, chat_id: &str, fragment: &str) -> Result<(JournalEntry, bool)> {
        append_to_ongoing_entry(&self.pool, chat_id, fragment).await
    }

    async fn finalize(&self, entry_id: i64, mood: &str, summary: &str) -> Result<bool> {
        finalize_entry(&self.pool, entry_id, mood, summary).await
    }

    async fn recent_done(&self, chat_id: &str, limit: i64) -> Result<Vec<JournalEntry>> {
        list_recent_done_entries(&self.pool, chat_id, limit).await
    }

    async fn entries_between(
        &self,
        chat_id: &str,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<JournalEntry>> {
        list_entries_between(&self.pool, chat_id, from, until).await
    }

    async fn search(&self, chat_id: &str, keyword: &str, limit: i64) -> Result<Vec<JournalEntry>> {
        search_entries(&self.pool, chat_id, keyword, limit).await
    }

    async fn chat_ids(&self) -> Result<Vec<String>> {
        list_chat_ids(&self.pool).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("coffee"), "coffee");
        assert_eq!(escape_like("100%"), r"100\%");
        assert_eq!(escape_like("snake_case"), r"snake\_case");
        assert_eq!(escape_like(r"C:\temp"), r"C:\\temp");
    }

    #[test]
    fn test_upsert_returns_creation_flag() {
        assert!(UPSERT_ONGOING.contains("ON CONFLICT (chat_id) WHERE status = 'ongoing'"));
        assert!(UPSERT_ONGOING.ends_with("(xmax = 0) AS created"));
    }
}
