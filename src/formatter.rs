//! # Response Formatter
//!
//! Presentation only: renders entries into message text, decides whether a
//! message carries lightweight markup worth rich rendering, converts that
//! markup to Telegram HTML, and splits long text to fit one message.

use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use teloxide::utils::html;

use crate::entry::JournalEntry;
use crate::localization::t_args_lang;

/// Telegram rejects messages above 4096 characters; HTML tags need headroom
pub const MAX_MESSAGE_CHARS: usize = 4000;

lazy_static! {
    static ref MARKUP_PATTERNS: Vec<Regex> = [
        r"(?m)^#{1,6}\s+\S",               // headers
        r"\*\*[^*\n]+\*\*",                // bold
        r"__[^_\n]+__",                    // bold
        r"\*[^*\s][^*\n]*\*",              // italic
        r"\b_[^_\n]+_\b",                  // italic
        r"\[[^\]\n]+\]\(https?://[^)\s]+\)", // links
    ]
    .iter()
    .map(|p| Regex::new(p).expect("Markup pattern should be valid"))
    .collect();
    static ref HEADER: Regex = Regex::new(r"(?m)^#{1,6}\s+(.+)$").expect("Header pattern should be valid");
    static ref LINK: Regex =
        Regex::new(r"\[([^\]\n]+)\]\((https?://[^)\s]+)\)").expect("Link pattern should be valid");
    static ref BOLD: Regex =
        Regex::new(r"\*\*([^*\n]+)\*\*|__([^_\n]+)__").expect("Bold pattern should be valid");
    static ref ITALIC: Regex =
        Regex::new(r"\*([^*\s][^*\n]*)\*|\b_([^_\n]+)_\b").expect("Italic pattern should be valid");
}

/// One outbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    /// Ask the transport for rich (HTML) rendering
    pub rich: bool,
}

impl Reply {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            rich: false,
        }
    }

    /// Rich rendering only when the text contains markup
    pub fn auto(text: impl Into<String>) -> Self {
        let text = text.into();
        let rich = has_markup(&text);
        Self { text, rich }
    }
}

pub fn format_timestamp(instant: &DateTime<Utc>) -> String {
    instant.format("%Y-%m-%d %H:%M").to_string()
}

pub fn format_date(instant: &DateTime<Utc>) -> String {
    instant.format("%Y-%m-%d").to_string()
}

/// Date, content and the mood line when there is one
pub fn format_entry(entry: &JournalEntry, language_code: Option<&str>) -> String {
    let mut rendered = format!("{}\n{}", format_timestamp(&entry.created_at), entry.content.trim());
    if let Some(mood) = entry.mood.as_deref().filter(|m| !m.is_empty()) {
        rendered.push('\n');
        rendered.push_str(&t_args_lang("entry-mood", &[("mood", mood)], language_code));
    }
    rendered
}

/// A titled list of entries separated by blank lines
pub fn format_entry_list(title: &str, entries: &[JournalEntry], language_code: Option<&str>) -> String {
    let mut sections = Vec::with_capacity(entries.len() + 1);
    sections.push(title.to_string());
    sections.extend(entries.iter().map(|entry| format_entry(entry, language_code)));
    sections.join("\n\n")
}

/// Whether the text uses headers, bold, italic or links
pub fn has_markup(text: &str) -> bool {
    MARKUP_PATTERNS.iter().any(|pattern| pattern.is_match(text))
}

/// Convert lightweight markdown to Telegram HTML. Everything else is escaped.
pub fn markdown_to_html(text: &str) -> String {
    let escaped = html::escape(text);
    let with_headers = HEADER.replace_all(&escaped, "<b>$1</b>");
    let with_links = LINK.replace_all(&with_headers, r#"<a href="$2">$1</a>"#);
    let with_bold = BOLD.replace_all(&with_links, "<b>$1$2</b>");
    ITALIC.replace_all(&with_bold, "<i>$1$2</i>").into_owned()
}

/// Split text into pieces of at most `max_chars` characters, preferring line
/// boundaries
pub fn chunk_message(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in text.split('\n') {
        let line_len = line.chars().count();
        let needed = if current.is_empty() { line_len } else { line_len + 1 };

        if current_len + needed <= max_chars {
            if !current.is_empty() {
                current.push('\n');
            }
            current.push_str(line);
            current_len += needed;
            continue;
        }

        if !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if line_len <= max_chars {
            current.push_str(line);
            current_len = line_len;
        } else {
            let chars: Vec<char> = line.chars().collect();
            for piece in chars.chunks(max_chars) {
                chunks.push(piece.iter().collect());
            }
        }
    }

    if !current.trim().is_empty() {
        chunks.push(current);
    }
    chunks.retain(|chunk| !chunk.trim().is_empty());
    chunks
}
