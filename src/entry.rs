//! # Journal Entry Model
//!
//! A journal entry belongs to exactly one chat. It starts `Ongoing`, grows as
//! the user sends messages, and becomes `Done` once mood and summary are set.

use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;

/// Trailing markers meaning "keep going on the same line"
pub const SOFT_CUT_MARKERS: [&str; 2] = ["...", "…"];

/// Persisted status of an entry. A chat without an ongoing row has no session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryStatus {
    Ongoing,
    Done,
}

impl EntryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryStatus::Ongoing => "ongoing",
            EntryStatus::Done => "done",
        }
    }
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ongoing" => Ok(EntryStatus::Ongoing),
            "done" => Ok(EntryStatus::Done),
            other => Err(anyhow::anyhow!("Unknown entry status: {other}")),
        }
    }
}

/// Represents a journal entry as stored
#[derive(Debug, Clone, PartialEq)]
pub struct JournalEntry {
    pub id: i64,
    pub chat_id: String,
    pub content: String,
    pub mood: Option<String>,
    pub summary: Option<String>,
    pub status: EntryStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JournalEntry {
    pub fn is_ongoing(&self) -> bool {
        self.status == EntryStatus::Ongoing
    }

    /// True when there is something worth finalizing
    pub fn has_content(&self) -> bool {
        !self.content.trim().is_empty()
    }
}

/// Join a new message onto the text accumulated so far.
///
/// The separator is empty for the first fragment, a single space after a
/// soft-cut marker, and a newline otherwise.
pub fn join_fragment(existing: &str, fragment: &str) -> String {
    if existing.is_empty() {
        return fragment.to_string();
    }

    let separator = if SOFT_CUT_MARKERS.iter().any(|m| existing.ends_with(m)) {
        " "
    } else {
        "\n"
    };

    let mut joined = String::with_capacity(existing.len() + separator.len() + fragment.len());
    joined.push_str(existing);
    joined.push_str(separator);
    joined.push_str(fragment);
    joined
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_first_fragment_has_no_separator() {
        assert_eq!(join_fragment("", "Had a great day"), "Had a great day");
    }

    #[test]
    fn test_join_uses_newline_by_default() {
        assert_eq!(join_fragment("Morning run.", "Then coffee."), "Morning run.\nThen coffee.");
    }

    #[test]
    fn test_join_after_soft_cut_uses_space() {
        assert_eq!(join_fragment("I was thinking...", "maybe not"), "I was thinking... maybe not");
        assert_eq!(join_fragment("Then…", "silence"), "Then… silence");
    }

    #[test]
    fn test_join_preserves_prefix() {
        let existing = "line one\nline two";
        let joined = join_fragment(existing, "line three");
        assert!(joined.starts_with(existing));
    }

    #[test]
    fn test_status_round_trip_through_str() {
        assert_eq!("ongoing".parse::<EntryStatus>().unwrap(), EntryStatus::Ongoing);
        assert_eq!("done".parse::<EntryStatus>().unwrap(), EntryStatus::Done);
        assert!("archived".parse::<EntryStatus>().is_err());
        assert_eq!(EntryStatus::Done.to_string(), "done");
    }
}
