//! # Localization Tests
//!
//! Message lookup, fallback and interpolation against the embedded English
//! and French resources.

use journal_bot::localization::{detect_language, t_args_lang, t_lang, LocalizationManager};
use std::collections::HashMap;

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_localization() -> LocalizationManager {
        LocalizationManager::new().expect("Failed to create localization manager")
    }

    const KEYS: &[&str] = &[
        "welcome",
        "entry-started",
        "entry-started-implicit",
        "entry-already-ongoing",
        "entry-appended",
        "empty-message",
        "nothing-to-save",
        "entry-saving",
        "recent-title",
        "no-entries",
        "search-usage",
        "recap-moods",
        "recap-words",
        "analyze-default-question",
        "daily-reminder",
        "unsupported-message",
    ];

    #[test]
    fn test_every_key_exists_in_both_languages() {
        let manager = setup_localization();

        for key in KEYS {
            for language in ["en", "fr"] {
                let message = manager.get_message_in_language(key, language, None);
                assert!(
                    !message.starts_with("Missing translation"),
                    "{key} is missing in {language}"
                );
            }
        }
    }

    #[test]
    fn test_get_message_existing_key() {
        let manager = setup_localization();

        let message = manager.get_message_in_language("welcome", "en", None);
        assert!(message.contains("Commands"));
        assert!(message.contains("/wordcloud"));
    }

    #[test]
    fn test_get_message_nonexistent_key() {
        let manager = setup_localization();

        let message = manager.get_message_in_language("nonexistent-key", "en", None);
        assert!(message.starts_with("Missing translation:"));
    }

    #[test]
    fn test_get_message_unsupported_language() {
        let manager = setup_localization();

        let message = manager.get_message_in_language("welcome", "unsupported", None);
        // Should fall back to English
        assert!(message.contains("Commands"));
    }

    #[test]
    fn test_get_message_with_args() {
        let manager = setup_localization();

        let mut args = HashMap::new();
        args.insert("keyword", "coffee");

        let message = manager.get_message_in_language("no-search-results", "en", Some(&args));
        assert!(message.contains("\"coffee\""));
    }

    #[test]
    fn test_recap_stats_multiline() {
        let message = t_args_lang("recap-stats", &[("entries", "12"), ("days", "9")], None);
        assert_eq!(message, "Entries: 12\nDays journaled: 9");
    }

    #[test]
    fn test_french_messages() {
        let message = t_lang("welcome", Some("fr"));
        assert!(message.contains("Commandes"));

        let saved = t_args_lang("entry-saved", &[("mood", "Serein")], Some("fr-CA"));
        assert!(saved.contains("Serein"));
        assert_ne!(saved, t_args_lang("entry-saved", &[("mood", "Serein")], Some("en")));
    }

    #[test]
    fn test_detect_language() {
        assert_eq!(detect_language(Some("fr")), "fr");
        assert_eq!(detect_language(Some("FR-be")), "fr");
        assert_eq!(detect_language(Some("en-US")), "en");
        assert_eq!(detect_language(Some("de")), "en");
        assert_eq!(detect_language(None), "en");
    }
}
