//! Retrieval evaluation against labelled target concepts
//!
//! Each question names the curriculum node(s) that should answer it. A run
//! labels the top-k retrieval as a hit, a near miss (parent or child of a
//! target), or a miss.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

use crate::curriculum::ConceptRecord;
use crate::errors::Result;
use crate::rag::retrieval::Retriever;

/// One labelled question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalQuestion {
    pub question: String,
    #[serde(default)]
    pub target_node_id: Option<i64>,
    #[serde(default)]
    pub target_node_ids: Option<Vec<i64>>,
}

impl EvalQuestion {
    /// Target ids; the list form wins over the single id when both are present
    pub fn targets(&self) -> Vec<i64> {
        match &self.target_node_ids {
            Some(ids) if !ids.is_empty() => ids.clone(),
            _ => self.target_node_id.into_iter().collect(),
        }
    }
}

/// Outcome label for one question
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvalLabel {
    Success,
    Partial,
    Fail,
}

/// Label retrieved `source_ids` against `targets`.
///
/// `Success` if any target was retrieved; `Partial` if a retrieved node is a
/// target's parent or child; `Fail` otherwise.
pub fn evaluate(targets: &[i64], source_ids: &[i64], records: &[ConceptRecord]) -> EvalLabel {
    if targets.iter().any(|t| source_ids.contains(t)) {
        return EvalLabel::Success;
    }

    for &target in targets {
        let parent = records
            .iter()
            .find(|r| r.node_id == Some(target))
            .and_then(|r| r.parent_id);
        let children: HashSet<i64> = records
            .iter()
            .filter(|r| r.parent_id == Some(target))
            .filter_map(|r| r.node_id)
            .collect();

        if source_ids
            .iter()
            .any(|s| Some(*s) == parent || children.contains(s))
        {
            return EvalLabel::Partial;
        }
    }

    EvalLabel::Fail
}

/// Per-question evaluation record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalOutcome {
    pub question: String,
    pub targets: Vec<i64>,
    pub topk_node_ids: Vec<i64>,
    pub label: EvalLabel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Aggregate counts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvalSummary {
    pub total: usize,
    pub success: usize,
    pub partial: usize,
    pub fail: usize,
}

impl EvalSummary {
    pub fn add(&mut self, label: EvalLabel) {
        self.total += 1;
        match label {
            EvalLabel::Success => self.success += 1,
            EvalLabel::Partial => self.partial += 1,
            EvalLabel::Fail => self.fail += 1,
        }
    }

    /// Fraction of questions whose target was retrieved
    pub fn hit_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.success as f64 / self.total as f64
        }
    }
}

/// Result of one evaluation run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvalReport {
    pub top_k: usize,
    pub outcomes: Vec<EvalOutcome>,
    pub summary: EvalSummary,
}

impl EvalReport {
    fn with_label(&self, label: EvalLabel) -> Vec<&EvalOutcome> {
        self.outcomes.iter().filter(|o| o.label == label).collect()
    }

    /// Write `all.json`, `success.json`, `partial_fail.json`, `fail.json` and
    /// `summary.json` under `dir`
    pub fn save(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)?;
        let write = |name: &str, json: String| fs::write(dir.join(name), json);

        write("all.json", serde_json::to_string_pretty(&self.outcomes)?)?;
        write(
            "success.json",
            serde_json::to_string_pretty(&self.with_label(EvalLabel::Success))?,
        )?;
        write(
            "partial_fail.json",
            serde_json::to_string_pretty(&self.with_label(EvalLabel::Partial))?,
        )?;
        write(
            "fail.json",
            serde_json::to_string_pretty(&self.with_label(EvalLabel::Fail))?,
        )?;
        write("summary.json", serde_json::to_string_pretty(&self.summary)?)?;

        info!(dir = %dir.display(), "evaluation results saved");
        Ok(())
    }
}

/// Read a JSON array of [`EvalQuestion`]s
pub fn load_questions(path: &Path) -> Result<Vec<EvalQuestion>> {
    let json = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&json)?)
}

/// Runs labelled questions through a retriever
pub struct Evaluator<'a> {
    retriever: &'a dyn Retriever,
    records: &'a [ConceptRecord],
    top_k: usize,
}

impl<'a> Evaluator<'a> {
    pub fn new(retriever: &'a dyn Retriever, records: &'a [ConceptRecord], top_k: usize) -> Self {
        Self {
            retriever,
            records,
            top_k,
        }
    }

    /// Evaluate every question. A failed search counts as `Fail`.
    pub fn run<F: FnMut(usize, &EvalOutcome)>(
        &self,
        questions: &[EvalQuestion],
        mut progress: F,
    ) -> EvalReport {
        let mut report = EvalReport {
            top_k: self.top_k,
            ..Default::default()
        };

        for (i, question) in questions.iter().enumerate() {
            let targets = question.targets();
            let outcome = match self.retriever.search(&question.question, self.top_k, 0.0) {
                Ok(results) => {
                    let ids: Vec<i64> = results.iter().filter_map(|r| r.node_id()).collect();
                    EvalOutcome {
                        label: evaluate(&targets, &ids, self.records),
                        question: question.question.clone(),
                        targets,
                        topk_node_ids: ids,
                        error: None,
                    }
                }
                Err(e) => {
                    warn!(question = %question.question, error = %e, "search failed");
                    EvalOutcome {
                        question: question.question.clone(),
                        targets,
                        topk_node_ids: Vec::new(),
                        label: EvalLabel::Fail,
                        error: Some(e.to_string()),
                    }
                }
            };

            report.summary.add(outcome.label);
            progress(i + 1, &outcome);
            report.outcomes.push(outcome);
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::QnaError;
    use crate::rag::retrieval::SearchResult;
    use tempfile::TempDir;

    fn node(id: i64, parent: Option<i64>) -> ConceptRecord {
        let mut record = ConceptRecord::named(&format!("node {}", id));
        record.node_id = Some(id);
        record.parent_id = parent;
        record
    }

    fn tree() -> Vec<ConceptRecord> {
        // 1 -> 2 -> 3, 1 -> 4
        vec![node(1, None), node(2, Some(1)), node(3, Some(2)), node(4, Some(1))]
    }

    #[test]
    fn test_labels() {
        let records = tree();
        assert_eq!(evaluate(&[2], &[5, 2], &records), EvalLabel::Success);
        // parent of target
        assert_eq!(evaluate(&[2], &[1], &records), EvalLabel::Partial);
        // child of target
        assert_eq!(evaluate(&[2], &[3], &records), EvalLabel::Partial);
        // sibling
        assert_eq!(evaluate(&[2], &[4], &records), EvalLabel::Fail);
        assert_eq!(evaluate(&[], &[1], &records), EvalLabel::Fail);
    }

    #[test]
    fn test_targets_prefer_list() {
        let q: EvalQuestion = serde_json::from_str(
            r#"{"question":"q","target_node_id":1,"target_node_ids":[2,3]}"#,
        )
        .unwrap();
        assert_eq!(q.targets(), vec![2, 3]);

        let q: EvalQuestion =
            serde_json::from_str(r#"{"question":"q","target_node_id":1}"#).unwrap();
        assert_eq!(q.targets(), vec![1]);
    }

    #[test]
    fn test_load_questions() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("questions.json");
        fs::write(&path, r#"[{"question":"토닉이란?","target_node_id":4}]"#).unwrap();
        let questions = load_questions(&path).unwrap();
        assert_eq!(questions[0].targets(), vec![4]);

        fs::write(&path, "[{").unwrap();
        let err = load_questions(&path).unwrap_err();
        assert!(matches!(err, QnaError::SerializationError(_)));
        assert!(!err.to_string().contains("curriculum"));
    }

    struct ById;

    impl Retriever for ById {
        fn search(&self, query: &str, _top_k: usize, _min_score: f32) -> Result<Vec<SearchResult>> {
            if query == "boom" {
                return Err(QnaError::RetrieverNotReady("unloaded".to_string()));
            }
            let id: i64 = query.parse().unwrap_or(0);
            let mut record = ConceptRecord::named("x");
            record.node_id = Some(id);
            Ok(vec![SearchResult::new(record, 0.9, 1)])
        }
    }

    fn question(text: &str, target: i64) -> EvalQuestion {
        EvalQuestion {
            question: text.to_string(),
            target_node_id: Some(target),
            target_node_ids: None,
        }
    }

    #[test]
    fn test_run_and_save() {
        let records = tree();
        let evaluator = Evaluator::new(&ById, &records, 3);
        let questions = vec![question("2", 2), question("3", 2), question("boom", 2)];

        let mut seen = 0;
        let report = evaluator.run(&questions, |_, _| seen += 1);
        assert_eq!(seen, 3);
        assert_eq!(
            report.summary,
            EvalSummary {
                total: 3,
                success: 1,
                partial: 1,
                fail: 1
            }
        );
        assert!(report.outcomes[2].error.is_some());
        assert!((report.summary.hit_rate() - 1.0 / 3.0).abs() < 1e-9);

        let dir = TempDir::new().unwrap();
        report.save(dir.path()).unwrap();
        let fails: Vec<EvalOutcome> =
            serde_json::from_str(&fs::read_to_string(dir.path().join("fail.json")).unwrap())
                .unwrap();
        assert_eq!(fails.len(), 1);
        assert!(dir.path().join("summary.json").exists());
    }
}
