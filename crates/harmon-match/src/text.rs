//! Text normalization shared by the matching strategies.

use std::collections::BTreeSet;

/// Normalizes text for comparison by lowercasing and replacing
/// separators with spaces.
pub fn normalize_text(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .replace(['_', '-', '.', '/', '\\'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Splits a name into lowercase tokens, breaking on separators and
/// camelCase boundaries.
pub fn token_set(raw: &str) -> BTreeSet<String> {
    let mut spaced = String::new();
    let mut prev_lower = false;
    for ch in raw.chars() {
        if ch.is_ascii_alphanumeric() {
            if prev_lower && ch.is_ascii_uppercase() {
                spaced.push(' ');
            }
            spaced.push(ch);
            prev_lower = ch.is_ascii_lowercase();
        } else {
            spaced.push(' ');
            prev_lower = false;
        }
    }
    spaced
        .split_whitespace()
        .map(str::to_ascii_lowercase)
        .filter(|t| !is_stopword(t))
        .collect()
}

fn is_stopword(token: &str) -> bool {
    matches!(
        token,
        "of" | "and" | "the" | "to" | "for" | "in" | "on" | "at" | "with" | "by" | "from" | "or"
            | "a"
            | "an"
    )
}
