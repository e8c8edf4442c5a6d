// Session bookkeeping: knowledge gaps found while answering and their analysis
//
// Components:
// - Gap Tracker: Records uncovered queries and answer outcomes, writes reports
// - Gap Analyzer: Aggregates reports across sessions

pub mod analyzer;
pub mod gaps;

// Re-export key types
pub use analyzer::{AnalyzerConfig, GapAnalysis, GapAnalyzer};
pub use gaps::{GapKind, GapRecord, GapReport, GapTracker, QueryStats, GAP_REPORT_PREFIX};
