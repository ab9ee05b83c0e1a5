//! Candidate name filtering.

/// Marks the store appends to product names; ignored when matching.
const TRADEMARK_MARKS: [char; 3] = ['™', '®', '©'];

/// Lowercase and drop trademark marks, so `HELLDIVERS™ 2` matches `helldivers 2`.
fn fold(name: &str) -> String {
    name.chars()
        .filter(|c| !TRADEMARK_MARKS.contains(c))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Whether a search result names the base product: it must contain `keyword`
/// and none of `exclusions`, all compared case-insensitively.
pub fn matches_filter(name: &str, keyword: &str, exclusions: &[String]) -> bool {
    let name = fold(name);
    if !name.contains(&fold(keyword)) {
        return false;
    }
    !exclusions
        .iter()
        .map(|ex| fold(ex))
        .filter(|ex| !ex.is_empty())
        .any(|ex| name.contains(&ex))
}
