//! # Journal Telegram Bot
//!
//! A Telegram bot that collects messages into journal entries, tags each
//! finished entry with a mood and a summary from a language model, and
//! answers questions about past entries: recent entries, moods, summaries,
//! keyword search, monthly recaps, word clouds and a year in review.

pub mod assistant;
pub mod assistant_errors;
pub mod bot;
pub mod commands;
pub mod config;
pub mod db;
pub mod entry;
pub mod formatter;
pub mod journal;
pub mod localization;
pub mod period;
pub mod reminder;
pub mod stopwords;
pub mod store;
pub mod text_analysis;
