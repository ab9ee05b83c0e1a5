//! Review-text normalization.
//!
//! Turns raw review bodies into the cleaned, stopword-free token stream fed to
//! the topic model: emoji become textual labels, accents and other non-ASCII
//! characters are dropped, HTML tags and links are removed, and the remaining
//! words are lowercased and filtered.
//!
//! [`normalize`] is total: a failure inside the pipeline is logged and yields
//! an empty string, so one bad review never aborts a batch.

mod cleanup;
mod emoji;
mod stopwords;

use std::panic::{self, AssertUnwindSafe};

use tracing::warn;

/// Clean one review body.
///
/// ```
/// let cleaned = reviewtopics_text::normalize("Great game!! http://example.com <b>really</b> fun");
/// assert_eq!(cleaned, "great game really fun");
/// ```
pub fn normalize(raw: &str) -> String {
    match panic::catch_unwind(AssertUnwindSafe(|| cleanup::run_pipeline(raw))) {
        Ok(cleaned) => cleaned,
        Err(payload) => {
            let reason = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            warn!(
                error = %reason,
                input_len = raw.len(),
                "text normalization failed, using empty text"
            );
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_links_tags_and_punctuation() {
        let result = normalize("Great game!! http://example.com <b>really</b> fun");
        assert_eq!(result, "great game really fun");
    }

    #[test]
    fn keeps_negations() {
        let result = normalize("not good, not bad");
        assert_eq!(result, "not good not bad");

        let result = normalize("No way this is worth it");
        assert_eq!(result, "no way worth");
    }

    #[test]
    fn emoji_become_labels() {
        let result = normalize("so much fun 😊");
        assert!(result.starts_with("much fun "));
        let label = result.trim_start_matches("much fun ");
        assert!(!label.is_empty());
        assert!(label.contains("smiling_face"));
        assert!(result.is_ascii());
    }

    #[test]
    fn emoji_only_review_keeps_label() {
        let result = normalize("😀😀");
        assert_eq!(result, "grinning_facegrinning_face");
    }

    #[test]
    fn normalizing_twice_changes_nothing() {
        let inputs = [
            "Great game!! http://example.com <b>really</b> fun",
            "I can't stop playing 😂😂 10/10 would dive again",
            "Crashes EVERY mission; HTTPS in caps? WWW.nope.com <3 <3",
            "Überwältigend — très bien. Not bad; NOT great either...",
            "ht<b>tpx great",
            "",
            "   \n\t  ",
        ];
        for input in inputs {
            let once = normalize(input);
            let twice = normalize(&once);
            assert_eq!(once, twice, "not idempotent for {input:?}");
        }
    }

    #[test]
    fn only_stopwords_yields_empty() {
        assert_eq!(normalize("it was the one that I had"), "one");
        assert_eq!(normalize("and the of"), "");
    }

    #[test]
    fn non_ascii_is_removed_not_replaced() {
        assert_eq!(normalize("naïve café ★★★★★"), "naive cafe");
    }
}
