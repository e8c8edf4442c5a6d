// Re-ranking of retrieved candidates
pub mod scorer;

pub use scorer::{match_names, normalize_term, AliasMatch, ReRankConfig, ReRanker};
