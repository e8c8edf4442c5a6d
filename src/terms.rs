//! Detection of English music-theory terms in a question

use regex::Regex;
use std::sync::OnceLock;

/// Terms recognised in queries, in reporting order
pub const MUSIC_TERMS: &[&str] = &[
    "Major",
    "minor",
    "Dominant",
    "Tonic",
    "Subdominant",
    "chord",
    "scale",
    "key",
    "triad",
    "seventh",
    "progression",
    "cadence",
    "resolution",
    "voice leading",
    "harmony",
    "diatonic",
    "non-diatonic",
    "secondary dominant",
    "tritone substitution",
];

fn patterns() -> &'static [(&'static str, Regex)] {
    static PATTERNS: OnceLock<Vec<(&'static str, Regex)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        MUSIC_TERMS
            .iter()
            .filter_map(|term| {
                // `-` is not a word char, so guard it explicitly: "diatonic"
                // must not fire inside "non-diatonic".
                let pattern = format!(r"(?i)(?:^|[^\w-]){}(?:$|[^\w-])", regex::escape(term));
                Regex::new(&pattern).ok().map(|re| (*term, re))
            })
            .collect()
    })
}

/// Vocabulary terms occurring as whole words in `text`, case-insensitive
pub fn detect_terms(text: &str) -> Vec<String> {
    patterns()
        .iter()
        .filter(|(_, re)| re.is_match(text))
        .map(|(term, _)| term.to_string())
        .collect()
}
