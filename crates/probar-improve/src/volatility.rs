//! Dynamic-signal detection.
//!
//! Classifies free text as volatile (likely to change between runs) or stable.
//! Every predicate here is pure and table driven; the result for a text never
//! depends on what else was classified before it.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Minimum length of headline-like text
pub const HEADLINE_MIN_CHARS: usize = 30;

/// Minimum word count of headline-like text
pub const HEADLINE_MIN_WORDS: usize = 5;

/// Words that mark weather, news, live or relative-day content (English and Dutch)
const VOLATILE_KEYWORDS: &[&str] = &[
    // English
    "breaking",
    "forecast",
    "headline",
    "headlines",
    "latest",
    "live",
    "news",
    "rain",
    "storm",
    "temperature",
    "today",
    "tomorrow",
    "tonight",
    "trending",
    "update",
    "updated",
    "weather",
    "yesterday",
    // Dutch
    "gisteren",
    "laatste",
    "liveblog",
    "morgen",
    "nieuws",
    "regen",
    "vandaag",
    "vanavond",
    "verkeer",
    "weer",
    "weerbericht",
];

/// A category of volatile content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolatileSignal {
    /// Run of two or more digits
    ContainsNumericFragment,
    /// Clock time or calendar date
    ContainsDateOrTimeFragment,
    /// Weather, news, live or relative-day keyword
    ContainsWeatherOrNewsFragment,
    /// Long mixed-case multi-word text, typical of article titles
    ContainsHeadlineLikeText,
    /// Literal `|`
    ContainsPipeSeparator,
}

impl VolatileSignal {
    /// All signal categories
    pub const ALL: [Self; 5] = [
        Self::ContainsNumericFragment,
        Self::ContainsDateOrTimeFragment,
        Self::ContainsWeatherOrNewsFragment,
        Self::ContainsHeadlineLikeText,
        Self::ContainsPipeSeparator,
    ];

    /// Stable name used in reports
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ContainsNumericFragment => "contains_numeric_fragment",
            Self::ContainsDateOrTimeFragment => "contains_date_or_time_fragment",
            Self::ContainsWeatherOrNewsFragment => "contains_weather_or_news_fragment",
            Self::ContainsHeadlineLikeText => "contains_headline_like_text",
            Self::ContainsPipeSeparator => "contains_pipe_separator",
        }
    }
}

impl std::fmt::Display for VolatileSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

fn numeric_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d{2,}").expect("static regex"))
}

fn date_time_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b\d{1,2}:\d{2}\b|\b\d{4}-\d{2}-\d{2}\b|\b\d{1,2}[/-]\d{1,2}[/-]\d{2,4}\b")
            .expect("static regex")
    })
}

/// Whether the text contains a whole word from the volatility keyword table
#[must_use]
pub fn has_volatile_keyword(text: &str) -> bool {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .any(|w| VOLATILE_KEYWORDS.contains(&w.to_lowercase().as_str()))
}

/// Whether the text reads like a headline rather than a label or prose
#[must_use]
pub fn is_headline_like(text: &str) -> bool {
    let trimmed = text.trim();
    trimmed.chars().count() >= HEADLINE_MIN_CHARS
        && trimmed.split_whitespace().count() >= HEADLINE_MIN_WORDS
        && trimmed.chars().any(char::is_uppercase)
        && trimmed.chars().any(char::is_lowercase)
}

/// Detect the volatility signals present in a text
#[must_use]
pub fn detect_signals(text: &str) -> BTreeSet<VolatileSignal> {
    let mut signals = BTreeSet::new();
    if text.trim().is_empty() {
        return signals;
    }
    if numeric_re().is_match(text) {
        signals.insert(VolatileSignal::ContainsNumericFragment);
    }
    if date_time_re().is_match(text) {
        signals.insert(VolatileSignal::ContainsDateOrTimeFragment);
    }
    if has_volatile_keyword(text) {
        signals.insert(VolatileSignal::ContainsWeatherOrNewsFragment);
    }
    if is_headline_like(text) {
        signals.insert(VolatileSignal::ContainsHeadlineLikeText);
    }
    if text.contains('|') {
        signals.insert(VolatileSignal::ContainsPipeSeparator);
    }
    signals
}

/// Whether text should be treated as volatile when used as a locator criterion.
///
/// True for two or more independent signal categories, or any keyword hit.
#[must_use]
pub fn is_volatile_text(text: &str) -> bool {
    let signals = detect_signals(text);
    signals.len() >= 2 || signals.contains(&VolatileSignal::ContainsWeatherOrNewsFragment)
}

/// Whether a locator text criterion is too volatile to match on.
///
/// Volatile text, or a headline: article titles rotate even without a
/// date or keyword in them.
#[must_use]
pub fn is_volatile_criterion(text: &str) -> bool {
    is_volatile_text(text) || is_headline_like(text)
}
