// Alias re-ranking: lexical override on top of semantic similarity
use serde::{Deserialize, Serialize};

use crate::curriculum::ConceptRecord;
use crate::rag::retrieval::SearchResult;

/// How a query lexically matched a candidate's names
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AliasMatch {
    /// No name or alias matched
    #[default]
    None,
    /// Normalized query contains, or is contained in, a normalized name
    Partial,
    /// Normalized query equals a normalized name
    Exact,
}

/// Re-ranking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReRankConfig {
    /// Score bonus for an exact name/alias match
    pub alias_boost: f32,
    /// Fraction of `alias_boost` granted to a partial match
    pub partial_weight: f32,
}

impl Default for ReRankConfig {
    fn default() -> Self {
        Self {
            alias_boost: 0.05,
            partial_weight: 0.5,
        }
    }
}

/// Normalize a term for lexical comparison: lowercase, drop whitespace, `-`, `_`, `/`.
///
/// "ii-V-I", "II V I" and "ii/v/i" all normalize to "iivi".
pub fn normalize_term(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '-' | '_' | '/'))
        .collect()
}

/// Best lexical match between a normalized query and a record's names
pub fn match_names(normalized_query: &str, record: &ConceptRecord) -> AliasMatch {
    if normalized_query.is_empty() {
        return AliasMatch::None;
    }

    let mut best = AliasMatch::None;
    for name in record.names() {
        let candidate = normalize_term(name);
        if candidate.is_empty() {
            continue;
        }
        if candidate == normalized_query {
            return AliasMatch::Exact;
        }
        // single-letter names (`V`, `I`) only match exactly
        if candidate.chars().count() < 2 || normalized_query.chars().count() < 2 {
            continue;
        }
        if candidate.contains(normalized_query) || normalized_query.contains(&candidate) {
            best = AliasMatch::Partial;
        }
    }
    best
}

/// Boosts candidates whose names literally match the query
pub struct ReRanker {
    config: ReRankConfig,
}

impl ReRanker {
    /// Create new re-ranker with default config
    pub fn new() -> Self {
        Self {
            config: ReRankConfig::default(),
        }
    }

    /// Create with custom configuration
    pub fn with_config(config: ReRankConfig) -> Self {
        Self { config }
    }

    /// Re-score and re-order candidates for `query`.
    ///
    /// The adjusted score is always `base_score + boost`, never derived from a
    /// previous adjusted score, so running this twice changes nothing. Exact
    /// matches sort ahead of everything else; the rest order by adjusted
    /// score. The sort is stable, and ranks are renumbered from 1.
    pub fn rerank(&self, query: &str, mut results: Vec<SearchResult>) -> Vec<SearchResult> {
        let normalized_query = normalize_term(query);

        for result in results.iter_mut() {
            result.alias_match = match_names(&normalized_query, &result.record);
            result.score = result.base_score + self.boost_for(result.alias_match);
        }

        results.sort_by(|a, b| {
            let a_exact = a.alias_match == AliasMatch::Exact;
            let b_exact = b.alias_match == AliasMatch::Exact;
            b_exact.cmp(&a_exact).then_with(|| {
                b.score
                    .partial_cmp(&a.score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
        });

        for (i, result) in results.iter_mut().enumerate() {
            result.rank = i + 1;
        }

        results
    }

    /// Score bonus for a match kind
    pub fn boost_for(&self, kind: AliasMatch) -> f32 {
        match kind {
            AliasMatch::Exact => self.config.alias_boost,
            AliasMatch::Partial => self.config.alias_boost * self.config.partial_weight,
            AliasMatch::None => 0.0,
        }
    }

    /// Get current configuration
    pub fn config(&self) -> &ReRankConfig {
        &self.config
    }

    /// Update configuration
    pub fn set_config(&mut self, config: ReRankConfig) {
        self.config = config;
    }
}

impl Default for ReRanker {
    fn default() -> Self {
        Self::new()
    }
}
