// Aggregation of gap reports across sessions
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::errors::Result;
use crate::session::gaps::{GapKind, GapReport, GAP_REPORT_PREFIX};

/// Gap analysis limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// How many missing terms to report
    pub top_terms: usize,
    /// Distinct example queries kept per gap kind
    pub queries_per_kind: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            top_terms: 20,
            queries_per_kind: 10,
        }
    }
}

/// Aggregated view over all reports in a directory
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GapAnalysis {
    pub reports_read: usize,
    pub total_gaps: usize,
    pub by_kind: BTreeMap<GapKind, usize>,
    /// Most frequent detected terms among gaps, most frequent first
    pub missing_terms: Vec<(String, usize)>,
    pub example_queries: BTreeMap<GapKind, Vec<String>>,
}

/// Reads `gap_report_*.json` files and summarises them
pub struct GapAnalyzer {
    config: AnalyzerConfig,
}

impl GapAnalyzer {
    pub fn new() -> Self {
        Self {
            config: AnalyzerConfig::default(),
        }
    }

    pub fn with_config(config: AnalyzerConfig) -> Self {
        Self { config }
    }

    /// Report files under `dir`, sorted by name (oldest first)
    pub fn report_paths(dir: &Path) -> Result<Vec<PathBuf>> {
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .map(|n| n.starts_with(GAP_REPORT_PREFIX) && n.ends_with(".json"))
                    .unwrap_or(false)
            })
            .collect();
        paths.sort();
        Ok(paths)
    }

    /// Analyse every report in `dir`. Unreadable reports are skipped with a warning.
    pub fn analyze(&self, dir: &Path) -> Result<GapAnalysis> {
        let mut reports = Vec::new();
        for path in Self::report_paths(dir)? {
            let parsed = fs::read_to_string(&path)
                .map_err(|e| e.to_string())
                .and_then(|json| {
                    serde_json::from_str::<GapReport>(&json).map_err(|e| e.to_string())
                });
            match parsed {
                Ok(report) => reports.push(report),
                Err(e) => warn!(path = %path.display(), error = %e, "skipping gap report"),
            }
        }
        debug!(reports = reports.len(), "gap reports loaded");
        Ok(self.summarize(&reports))
    }

    /// Summarise already loaded reports
    pub fn summarize(&self, reports: &[GapReport]) -> GapAnalysis {
        let mut analysis = GapAnalysis {
            reports_read: reports.len(),
            ..Default::default()
        };
        let mut term_counts: HashMap<&str, usize> = HashMap::new();

        for gap in reports.iter().flat_map(|r| r.gaps.iter()) {
            analysis.total_gaps += 1;
            *analysis.by_kind.entry(gap.kind).or_insert(0) += 1;

            for term in &gap.detected_terms {
                *term_counts.entry(term.as_str()).or_insert(0) += 1;
            }

            let examples = analysis.example_queries.entry(gap.kind).or_default();
            if examples.len() < self.config.queries_per_kind && !examples.contains(&gap.query) {
                examples.push(gap.query.clone());
            }
        }

        let mut terms: Vec<(String, usize)> = term_counts
            .into_iter()
            .map(|(term, count)| (term.to_string(), count))
            .collect();
        terms.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        terms.truncate(self.config.top_terms);
        analysis.missing_terms = terms;

        analysis
    }
}

impl Default for GapAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::gaps::GapTracker;
    use tempfile::TempDir;

    fn terms(list: &[&str]) -> Vec<String> {
        list.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn test_missing_directory_is_empty() {
        let dir = TempDir::new().unwrap();
        let analysis = GapAnalyzer::new().analyze(&dir.path().join("nope")).unwrap();
        assert_eq!(analysis.total_gaps, 0);
        assert_eq!(analysis.reports_read, 0);
    }

    #[test]
    fn test_analyze_saved_report() {
        let dir = TempDir::new().unwrap();
        let mut tracker = GapTracker::new();
        tracker.record("cadence?", GapKind::NoCoverage, &terms(&["cadence"]));
        tracker.record("cadence?", GapKind::NoCoverage, &terms(&["cadence"]));
        tracker.record("V/V chord", GapKind::PartialCoverage, &terms(&["chord", "cadence"]));
        tracker.save_report(dir.path()).unwrap();
        fs::write(dir.path().join("gap_report_broken.json"), "{").unwrap();
        fs::write(dir.path().join("notes.json"), "{}").unwrap();

        let analysis = GapAnalyzer::new().analyze(dir.path()).unwrap();
        assert_eq!(analysis.reports_read, 1);
        assert_eq!(analysis.total_gaps, 3);
        assert_eq!(analysis.by_kind[&GapKind::NoCoverage], 2);
        assert_eq!(analysis.by_kind[&GapKind::PartialCoverage], 1);
        assert_eq!(analysis.missing_terms[0], ("cadence".to_string(), 3));
        // duplicate queries are listed once
        assert_eq!(analysis.example_queries[&GapKind::NoCoverage], vec!["cadence?"]);
    }

    #[test]
    fn test_limits_apply() {
        let mut tracker = GapTracker::new();
        for i in 0..5 {
            tracker.record(&format!("q{}", i), GapKind::NoCoverage, &terms(&[format!("t{}", i).as_str()]));
        }
        let analyzer = GapAnalyzer::with_config(AnalyzerConfig {
            top_terms: 2,
            queries_per_kind: 3,
        });
        let analysis = analyzer.summarize(&[tracker.report()]);
        assert_eq!(analysis.missing_terms.len(), 2);
        assert_eq!(analysis.example_queries[&GapKind::NoCoverage].len(), 3);
    }
}
