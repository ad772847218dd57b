//! # Command Dispatcher
//!
//! Maps one inbound text message to a [`Command`]. Matching walks an ordered
//! table of patterns and the first match wins; anything unmatched is journal
//! text. Command keywords are case-insensitive, arguments keep their case.

use lazy_static::lazy_static;
use regex::{Captures, Regex};

/// Optional `Month Year` arguments of the reporting commands
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeriodArgs {
    pub month: Option<String>,
    pub year: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Add,
    Done,
    Entries,
    Moods(PeriodArgs),
    Summaries(PeriodArgs),
    Search(Option<String>),
    Recap(PeriodArgs),
    WordCloud(PeriodArgs),
    Analyze(Option<String>),
    /// Not a command: text for the ongoing entry
    Text(String),
}

/// Which command a dispatch-table row recognizes
#[derive(Debug, Clone, Copy)]
enum Kind {
    Start,
    Add,
    Done,
    Entries,
    Moods,
    Summaries,
    Search,
    Recap,
    WordCloud,
    Analyze,
}

// `(?:@\w+)?` accepts the `/command@botname` form used in group chats
const PERIOD_ARGS: &str = r"(?:@\w+)?(?:\s+(\S+)(?:\s+(\S+))?)?$";

lazy_static! {
    static ref DISPATCH_TABLE: Vec<(Regex, Kind)> = {
        let table = vec![
            (r"(?i)^/(?:start|help)(?:@\w+)?$".to_string(), Kind::Start),
            (r"(?i)^/add(?:@\w+)?$".to_string(), Kind::Add),
            (r"(?i)^/done(?:@\w+)?$".to_string(), Kind::Done),
            (r"(?i)^/entries(?:@\w+)?$".to_string(), Kind::Entries),
            (format!(r"(?i)^/moods{PERIOD_ARGS}"), Kind::Moods),
            (format!(r"(?i)^/summaries{PERIOD_ARGS}"), Kind::Summaries),
            (r"(?i)^/search(?:@\w+)?(?:\s+(.+))?$".to_string(), Kind::Search),
            (format!(r"(?i)^/recap{PERIOD_ARGS}"), Kind::Recap),
            (format!(r"(?i)^/wordcloud{PERIOD_ARGS}"), Kind::WordCloud),
            (r"(?is)^/analyze(?:@\w+)?(?:\s+(.+))?$".to_string(), Kind::Analyze),
        ];

        table
            .into_iter()
            .map(|(pattern, kind)| {
                (Regex::new(&pattern).expect("Command pattern should be valid"), kind)
            })
            .collect()
    };
}

fn build(kind: Kind, captures: &Captures) -> Command {
    match kind {
        Kind::Start => Command::Start,
        Kind::Add => Command::Add,
        Kind::Done => Command::Done,
        Kind::Entries => Command::Entries,
        Kind::Moods => Command::Moods(period_args(captures)),
        Kind::Summaries => Command::Summaries(period_args(captures)),
        Kind::Search => Command::Search(capture(captures, 1)),
        Kind::Recap => Command::Recap(period_args(captures)),
        Kind::WordCloud => Command::WordCloud(period_args(captures)),
        Kind::Analyze => Command::Analyze(capture(captures, 1)),
    }
}

fn capture(captures: &Captures, index: usize) -> Option<String> {
    captures
        .get(index)
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

fn period_args(captures: &Captures) -> PeriodArgs {
    PeriodArgs {
        month: capture(captures, 1),
        year: capture(captures, 2),
    }
}

impl Command {
    /// Dispatch a message. The text is trimmed before matching.
    pub fn parse(text: &str) -> Command {
        let text = text.trim();

        DISPATCH_TABLE
            .iter()
            .find_map(|(pattern, kind)| pattern.captures(text).map(|c| build(*kind, &c)))
            .unwrap_or_else(|| Command::Text(text.to_string()))
    }

    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Command::Start => "start",
            Command::Add => "add",
            Command::Done => "done",
            Command::Entries => "entries",
            Command::Moods(_) => "moods",
            Command::Summaries(_) => "summaries",
            Command::Search(_) => "search",
            Command::Recap(_) => "recap",
            Command::WordCloud(_) => "wordcloud",
            Command::Analyze(_) => "analyze",
            Command::Text(_) => "text",
        }
    }
}
