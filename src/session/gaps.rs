// Knowledge-gap tracking for one answering session
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::errors::Result;

/// Prefix shared by every gap report file name
pub const GAP_REPORT_PREFIX: &str = "gap_report_";

/// Why a query was recorded as a gap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapKind {
    /// Nothing in the curriculum cleared the grounding floor
    NoCoverage,
    /// Grounded, but only by weakly similar concepts
    PartialCoverage,
}

impl GapKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GapKind::NoCoverage => "no_coverage",
            GapKind::PartialCoverage => "partial_coverage",
        }
    }
}

/// One query the curriculum could not fully answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GapRecord {
    pub query: String,
    #[serde(rename = "type")]
    pub kind: GapKind,
    #[serde(default)]
    pub detected_terms: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

impl GapRecord {
    pub fn new(query: &str, kind: GapKind, detected_terms: Vec<String>) -> Self {
        Self {
            query: query.to_string(),
            kind,
            detected_terms,
            timestamp: Utc::now(),
        }
    }
}

/// Answer outcome counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryStats {
    pub total_queries: usize,
    pub successful_answers: usize,
    pub partial_answers: usize,
    pub no_data_answers: usize,
    pub errors: usize,
}

/// Gap report as written to disk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GapReport {
    pub session_date: DateTime<Utc>,
    pub statistics: QueryStats,
    pub total_gaps: usize,
    pub gaps: Vec<GapRecord>,
}

/// Collects gaps and outcome counters across queries
#[derive(Debug, Default)]
pub struct GapTracker {
    gaps: Vec<GapRecord>,
    stats: QueryStats,
}

impl GapTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a gap for `query`
    pub fn record(&mut self, query: &str, kind: GapKind, detected_terms: &[String]) {
        self.gaps
            .push(GapRecord::new(query, kind, detected_terms.to_vec()));
    }

    /// Mutable access to the outcome counters
    pub fn stats_mut(&mut self) -> &mut QueryStats {
        &mut self.stats
    }

    pub fn stats(&self) -> &QueryStats {
        &self.stats
    }

    pub fn gaps(&self) -> &[GapRecord] {
        &self.gaps
    }

    /// Snapshot of the session as a report
    pub fn report(&self) -> GapReport {
        GapReport {
            session_date: Utc::now(),
            statistics: self.stats.clone(),
            total_gaps: self.gaps.len(),
            gaps: self.gaps.clone(),
        }
    }

    /// Write `gap_report_<YYYYmmdd_HHMMSS>.json` under `dir`.
    ///
    /// Returns `None` without touching the filesystem when no gaps were recorded.
    pub fn save_report(&self, dir: &Path) -> Result<Option<PathBuf>> {
        if self.gaps.is_empty() {
            return Ok(None);
        }

        fs::create_dir_all(dir)?;
        let filename = format!(
            "{}{}.json",
            GAP_REPORT_PREFIX,
            Local::now().format("%Y%m%d_%H%M%S")
        );
        let path = dir.join(filename);

        let json = serde_json::to_string_pretty(&self.report())?;
        fs::write(&path, json)?;

        info!(path = %path.display(), gaps = self.gaps.len(), "gap report saved");
        Ok(Some(path))
    }
}
