//! Review-text cleaning passes.
//!
//! Each pass is a function applied in sequence; the output of one feeds the
//! next. Emoji are labelled before Unicode decomposition so they are still
//! present to be recognized when the ASCII filter runs.

use std::sync::LazyLock;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;

use crate::emoji::substitute_emoji;
use crate::stopwords::is_stopword;

/// Run the full cleaning pipeline on raw review text.
pub(crate) fn run_pipeline(raw: &str) -> String {
    let text = substitute_emoji(raw);
    let text = fold_to_ascii(&text);
    let text = strip_markup_and_links(&text);
    let text = lowercase_and_split_punctuation(&text);

    tokenize(&text)
        .filter(|token| !is_stopword(token))
        .collect::<Vec<_>>()
        .join(" ")
}

// ---------------------------------------------------------------------------
// Pass 1: Unicode decomposition + ASCII filter
// ---------------------------------------------------------------------------

/// Decompose (NFKD) and drop everything outside 7-bit ASCII, so `café` → `cafe`.
fn fold_to_ascii(text: &str) -> String {
    text.nfkd().filter(char::is_ascii).collect()
}

// ---------------------------------------------------------------------------
// Pass 2: HTML tags and links
// ---------------------------------------------------------------------------

/// Remove tag-like spans, then URL-like tokens.
///
/// Tags go first so that fragments joined by a removed tag (`ht<b>tps`) are
/// seen by the link pass. Link prefixes match case-insensitively; lowercasing
/// happens after this pass and would otherwise expose `HTTP…` tokens on a
/// second run.
fn strip_markup_and_links(text: &str) -> String {
    static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<.*?>").expect("valid regex"));
    static LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?i)http\S+|www\S+|bit\.ly/\S+").expect("valid regex")
    });

    let text = TAG_RE.replace_all(text, "");
    LINK_RE.replace_all(&text, "").into_owned()
}

// ---------------------------------------------------------------------------
// Pass 3: Case and sentence punctuation
// ---------------------------------------------------------------------------

fn lowercase_and_split_punctuation(text: &str) -> String {
    static SENTENCE_PUNCT_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"[.,!?;]").expect("valid regex"));

    SENTENCE_PUNCT_RE
        .replace_all(&text.to_lowercase(), " ")
        .into_owned()
}

// ---------------------------------------------------------------------------
// Pass 4: Tokenize
// ---------------------------------------------------------------------------

/// Runs of word characters; everything else separates tokens.
fn tokenize(text: &str) -> impl Iterator<Item = &str> {
    static WORD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\w+").expect("valid regex"));

    WORD_RE.find_iter(text).map(|m| m.as_str())
}
