//! Noise filter for snapshot text.
//!
//! Shared by the differ and every assertion producer, so a string rejected here
//! never becomes an assertion payload anywhere.

/// Minimum accepted text length in characters
pub const MIN_TEXT_CHARS: usize = 2;

/// Maximum accepted text length in characters
pub const MAX_TEXT_CHARS: usize = 120;

/// Whether text is unusable as an assertion payload
#[must_use]
pub fn is_noisy_text(text: &str) -> bool {
    let trimmed = text.trim();
    let len = trimmed.chars().count();
    if !(MIN_TEXT_CHARS..=MAX_TEXT_CHARS).contains(&len) {
        return true;
    }
    if !trimmed.chars().any(char::is_alphabetic) {
        return true;
    }
    if is_pure_numeric(trimmed) {
        return true;
    }
    is_bare_url(trimmed)
}

/// Digits with optional grouping, sign, decimal or percent characters
fn is_pure_numeric(text: &str) -> bool {
    text.chars().any(|c| c.is_ascii_digit())
        && text
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | ',' | '-' | '+' | '%' | ' '))
}

fn is_bare_url(text: &str) -> bool {
    if text.contains(char::is_whitespace) {
        return false;
    }
    let lowered = text.to_ascii_lowercase();
    lowered.starts_with("http://")
        || lowered.starts_with("https://")
        || lowered.starts_with("www.")
        || lowered.starts_with("mailto:")
}
