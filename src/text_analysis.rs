//! # Text Analysis Module
//!
//! Word-frequency ranking over journal text, used by `/wordcloud` and
//! `/recap`.
//!
//! ## Rules
//!
//! - Tokens are the pieces left after splitting on runs of non-word characters
//! - Tokens shorter than [`MIN_WORD_LENGTH`] characters are dropped
//! - Stopwords are dropped regardless of case
//! - Counting is case-folded; ties keep the order words were first seen

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;
use tracing::debug;

use crate::stopwords::is_stopword;

pub const MIN_WORD_LENGTH: usize = 3;
pub const WORDCLOUD_SIZE: usize = 20;
pub const RECAP_WORDS: usize = 10;

lazy_static! {
    static ref NON_WORD: Regex = Regex::new(r"\W+").expect("Non-word pattern should be valid");
}

/// A ranked word and how often it appeared
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordCount {
    pub word: String,
    pub count: usize,
}

/// Split text into candidate words, dropping short tokens and stopwords
pub fn tokenize(text: &str) -> impl Iterator<Item = &str> {
    NON_WORD
        .split(text)
        .filter(|token| token.chars().count() >= MIN_WORD_LENGTH)
        .filter(|token| !is_stopword(token))
}

/// Count case-folded words, keeping the order each was first seen, then rank
/// by count. `Vec::sort_by` is stable, so equal counts stay in that order.
fn count_in_order<I>(words: I) -> Vec<WordCount>
where
    I: IntoIterator<Item = String>,
{
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut counts: Vec<WordCount> = Vec::new();

    for word in words {
        match positions.get(&word) {
            Some(&index) => counts[index].count += 1,
            None => {
                positions.insert(word.clone(), counts.len());
                counts.push(WordCount { word, count: 1 });
            }
        }
    }

    counts.sort_by(|a, b| b.count.cmp(&a.count));
    counts
}

/// Rank every word of the corpus by frequency
pub fn word_frequencies(corpus: &str) -> Vec<WordCount> {
    let counts = count_in_order(tokenize(corpus).map(str::to_lowercase));
    debug!(distinct_words = counts.len(), "Word frequencies computed");
    counts
}

/// The `limit` most frequent words of the corpus
pub fn top_words(corpus: &str, limit: usize) -> Vec<WordCount> {
    let mut ranked = word_frequencies(corpus);
    ranked.truncate(limit);
    ranked
}

/// Count labels such as moods, case-folded, most frequent first. Blank
/// labels are skipped.
pub fn tally_labels<'a, I>(labels: I) -> Vec<WordCount>
where
    I: IntoIterator<Item = &'a str>,
{
    count_in_order(
        labels
            .into_iter()
            .map(|label| label.trim().to_lowercase())
            .filter(|label| !label.is_empty()),
    )
}

/// Uppercase the first character
pub fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// One `Word: count` line per ranked word
pub fn render_word_counts(words: &[WordCount]) -> String {
    words
        .iter()
        .map(|wc| format!("{}: {}", capitalize(&wc.word), wc.count))
        .collect::<Vec<_>>()
        .join("\n")
}
