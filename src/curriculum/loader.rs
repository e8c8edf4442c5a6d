// Curriculum loader: JSON array of concept records -> validated Vec<ConceptRecord>
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::curriculum::record::ConceptRecord;
use crate::errors::{QnaError, Result};

/// Summary numbers for a loaded curriculum
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurriculumStats {
    pub total_records: usize,
    /// Mean definition length in characters
    pub avg_definition_length: f64,
    pub unique_concepts_ko: usize,
    pub unique_concepts_en: usize,
}

/// Loads and queries the concept curriculum
pub struct CurriculumLoader {
    path: PathBuf,
    records: Vec<ConceptRecord>,
}

impl CurriculumLoader {
    /// Create a loader for the given JSON file (nothing is read yet)
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            records: Vec::new(),
        }
    }

    /// Build a loader around records already in memory
    pub fn from_records(records: Vec<ConceptRecord>) -> Self {
        Self {
            path: PathBuf::new(),
            records,
        }
    }

    /// Read, parse and validate the curriculum file
    pub fn load(&mut self) -> Result<&[ConceptRecord]> {
        self.records = load_records(&self.path)?;
        info!(
            path = %self.path.display(),
            records = self.records.len(),
            "Curriculum loaded"
        );
        Ok(&self.records)
    }

    pub fn records(&self) -> &[ConceptRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<ConceptRecord> {
        self.records
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Find a record by its curriculum node id
    pub fn get_by_node_id(&self, node_id: i64) -> Option<&ConceptRecord> {
        self.records.iter().find(|r| r.node_id == Some(node_id))
    }

    /// Case-insensitive substring match over every text field
    pub fn search_keyword(&self, keyword: &str) -> Vec<&ConceptRecord> {
        let needle = keyword.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }

        self.records
            .iter()
            .filter(|record| {
                record
                    .text_fields()
                    .join(" ")
                    .to_lowercase()
                    .contains(&needle)
            })
            .collect()
    }

    pub fn statistics(&self) -> CurriculumStats {
        let total_records = self.records.len();
        let avg_definition_length = if total_records == 0 {
            0.0
        } else {
            let total: usize = self
                .records
                .iter()
                .map(|r| r.definition.chars().count())
                .sum();
            total as f64 / total_records as f64
        };

        let unique_concepts_ko = self
            .records
            .iter()
            .map(|r| r.concept_ko.as_str())
            .collect::<HashSet<_>>()
            .len();
        let unique_concepts_en = self
            .records
            .iter()
            .map(|r| r.concept_en.as_str())
            .collect::<HashSet<_>>()
            .len();

        CurriculumStats {
            total_records,
            avg_definition_length,
            unique_concepts_ko,
            unique_concepts_en,
        }
    }

    /// Write the current records as pretty JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.records)?;
        fs::write(path, json)?;
        debug!(path = %path.display(), records = self.records.len(), "Curriculum saved");
        Ok(())
    }
}

/// Read and validate a curriculum file
pub fn load_records(path: &Path) -> Result<Vec<ConceptRecord>> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(QnaError::CurriculumNotFound(path.display().to_string()));
        }
        Err(e) => return Err(e.into()),
    };

    parse_records(&contents, &path.display().to_string())
}

/// Parse curriculum JSON text.
///
/// Elements are decoded one at a time so the error names the offending index.
pub fn parse_records(json: &str, source: &str) -> Result<Vec<ConceptRecord>> {
    let values: Vec<serde_json::Value> =
        serde_json::from_str(json).map_err(|e| QnaError::CurriculumParse {
            path: source.to_string(),
            reason: e.to_string(),
        })?;

    values
        .into_iter()
        .enumerate()
        .map(|(index, value)| {
            let record: ConceptRecord = serde_json::from_value(value)
                .map_err(|e| QnaError::InvalidRecord {
                    index,
                    reason: e.to_string(),
                })?;
            record
                .validate()
                .map_err(|reason| QnaError::InvalidRecord { index, reason })?;
            Ok(record)
        })
        .collect()
}
