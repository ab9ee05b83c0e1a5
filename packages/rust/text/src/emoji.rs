//! Emoji-to-label substitution.

/// Textual label for an emoji character, e.g. `😀` → `grinning_face`.
///
/// The label is the emoji's name with punctuation removed and words joined by
/// underscores. Returns `None` for anything that is not an emoji, and for all
/// ASCII characters (digits, `#` and `*` are emoji components but never
/// substituted on their own).
pub(crate) fn emoji_label(c: char) -> Option<String> {
    if c.is_ascii() {
        return None;
    }

    let mut buf = [0u8; 4];
    let emoji = emojis::get(c.encode_utf8(&mut buf))?;

    let words: String = emoji
        .name()
        .chars()
        .filter(|ch| ch.is_alphanumeric() || ch.is_whitespace())
        .collect();
    let label = words.split_whitespace().collect::<Vec<_>>().join("_");

    (!label.is_empty()).then_some(label)
}

/// Replace every emoji in `text` with its label; other characters pass through.
pub(crate) fn substitute_emoji(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match emoji_label(c) {
            Some(label) => out.push_str(&label),
            None => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grinning_face_label() {
        assert_eq!(emoji_label('😀').as_deref(), Some("grinning_face"));
    }

    #[test]
    fn labels_are_underscore_joined_without_punctuation() {
        let label = emoji_label('😂').unwrap();
        assert!(!label.contains(' '));
        assert!(label.chars().all(|c| c.is_alphanumeric() || c == '_'));
        assert!(label.contains("face"));
    }

    #[test]
    fn plain_characters_are_not_emoji() {
        assert!(emoji_label('a').is_none());
        assert!(emoji_label('#').is_none());
        assert!(emoji_label('7').is_none());
        assert!(emoji_label('é').is_none());
    }

    #[test]
    fn substitution_keeps_surrounding_text() {
        let out = substitute_emoji("love it 😀!");
        assert_eq!(out, "love it grinning_face!");
    }
}
