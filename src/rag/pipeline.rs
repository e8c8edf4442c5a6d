// End-to-end answer assembly: retrieve -> ground -> prompt -> chat completion
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::errors::{QnaError, Result};
use crate::llm::ChatModel;
use crate::rag::context::{ContextBuilder, ContextConfig, GROUNDING_SYSTEM_PROMPT};
use crate::rag::retrieval::{Retriever, SearchParams, SearchResult};
use crate::session::{GapKind, GapRecord, GapTracker, QueryStats};
use crate::terms::detect_terms;

/// How strongly the answer is backed by the curriculum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    High,
    Medium,
    None,
    Error,
}

/// How much of the question the retrieved concepts cover
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Coverage {
    Complete,
    Partial,
    None,
    Error,
}

/// RAG pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RAGConfig {
    /// Search parameters for retrieval
    pub search: SearchParams,
    /// Context assembly configuration
    pub context: ContextConfig,
    /// Sources whose re-ranked score is below this are not used for grounding
    pub min_similarity: f32,
    /// A source at or above this re-ranked score makes the answer fully grounded
    pub high_confidence: f32,
}

impl Default for RAGConfig {
    fn default() -> Self {
        Self {
            search: SearchParams::default(),
            context: ContextConfig::default(),
            min_similarity: 0.5,
            high_confidence: 0.7,
        }
    }
}

/// One assembled answer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagResponse {
    pub answer: String,
    /// Concepts the answer was grounded on, in prompt order
    pub sources: Vec<SearchResult>,
    pub model: String,
    pub timestamp: DateTime<Utc>,
    pub detected_terms: Vec<String>,
    pub confidence: Confidence,
    pub coverage: Coverage,
    pub gap_recorded: bool,
}

impl RagResponse {
    pub fn is_error(&self) -> bool {
        self.confidence == Confidence::Error
    }

    pub fn is_grounded(&self) -> bool {
        !self.sources.is_empty()
    }
}

/// Canned reply for questions the curriculum does not cover
pub fn no_data_answer(query: &str, detected_terms: &[String]) -> String {
    let terms = if detected_terms.is_empty() {
        "없음".to_string()
    } else {
        detected_terms.join(", ")
    };
    format!(
        "죄송합니다. 현재 데이터셋에 \"{}\"에 대한 정보가 없습니다.\n\n\
         감지된 음악 용어: {}\n\n\
         이 주제는 향후 데이터셋 확장 시 추가될 예정입니다.\n\
         다른 음악 이론 관련 질문을 해주시면 답변 가능 여부를 확인하겠습니다.",
        query, terms
    )
}

/// End-to-end RAG pipeline.
///
/// Retrieval and the chat model are injected; the pipeline owns only the
/// per-session gap tracker.
pub struct RAGPipeline {
    retriever: Arc<dyn Retriever>,
    chat: Arc<dyn ChatModel>,
    context_builder: ContextBuilder,
    config: RAGConfig,
    tracker: GapTracker,
}

impl RAGPipeline {
    /// Create new RAG pipeline
    pub fn new(retriever: Arc<dyn Retriever>, chat: Arc<dyn ChatModel>) -> Self {
        Self::with_config(retriever, chat, RAGConfig::default())
    }

    /// Create with custom configuration
    pub fn with_config(
        retriever: Arc<dyn Retriever>,
        chat: Arc<dyn ChatModel>,
        config: RAGConfig,
    ) -> Self {
        Self {
            retriever,
            chat,
            context_builder: ContextBuilder::with_config(config.context.clone()),
            config,
            tracker: GapTracker::new(),
        }
    }

    /// Answer a question. Never fails: infrastructure errors become an error response.
    pub async fn answer(&mut self, query: &str) -> RagResponse {
        self.tracker.stats_mut().total_queries += 1;
        let detected_terms = detect_terms(query);

        match self.try_answer(query, &detected_terms).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "answer failed");
                self.tracker.stats_mut().errors += 1;
                self.error_response(&e, detected_terms)
            }
        }
    }

    async fn try_answer(&mut self, query: &str, detected_terms: &[String]) -> Result<RagResponse> {
        let candidates = self.retriever.search(
            query,
            self.config.search.top_k,
            self.config.search.min_score,
        )?;

        let grounded: Vec<SearchResult> = candidates
            .into_iter()
            .filter(|c| c.score >= self.config.min_similarity)
            .collect();

        if grounded.is_empty() {
            info!(query, "no curriculum coverage");
            return Ok(self.no_data_response(query, detected_terms));
        }

        let best = grounded
            .iter()
            .map(|c| c.score)
            .fold(f32::NEG_INFINITY, f32::max);
        let (confidence, coverage) = if best >= self.config.high_confidence {
            (Confidence::High, Coverage::Complete)
        } else {
            (Confidence::Medium, Coverage::Partial)
        };

        // a complete answer is grounded on high-tier sources only
        let tier_floor = match confidence {
            Confidence::High => self.config.high_confidence,
            _ => self.config.min_similarity,
        };
        let sources: Vec<SearchResult> = grounded
            .into_iter()
            .filter(|c| c.score >= tier_floor)
            .take(self.config.context.max_passages)
            .collect();
        let user_message = self.context_builder.user_message(query, &sources);

        let answer = self
            .chat
            .complete(GROUNDING_SYSTEM_PROMPT, &user_message)
            .await?;

        let gap_recorded = coverage == Coverage::Partial;
        if gap_recorded {
            self.tracker
                .record(query, GapKind::PartialCoverage, detected_terms);
            self.tracker.stats_mut().partial_answers += 1;
        } else {
            self.tracker.stats_mut().successful_answers += 1;
        }

        info!(
            query,
            sources = sources.len(),
            best_score = best,
            ?confidence,
            "answer assembled"
        );

        Ok(RagResponse {
            answer,
            sources,
            model: self.chat.model_name().to_string(),
            timestamp: Utc::now(),
            detected_terms: detected_terms.to_vec(),
            confidence,
            coverage,
            gap_recorded,
        })
    }

    fn no_data_response(&mut self, query: &str, detected_terms: &[String]) -> RagResponse {
        self.tracker
            .record(query, GapKind::NoCoverage, detected_terms);
        self.tracker.stats_mut().no_data_answers += 1;

        RagResponse {
            answer: no_data_answer(query, detected_terms),
            sources: Vec::new(),
            model: self.chat.model_name().to_string(),
            timestamp: Utc::now(),
            detected_terms: detected_terms.to_vec(),
            confidence: Confidence::None,
            coverage: Coverage::None,
            gap_recorded: true,
        }
    }

    fn error_response(&self, error: &QnaError, detected_terms: Vec<String>) -> RagResponse {
        RagResponse {
            answer: format!("시스템 오류: {}", error),
            sources: Vec::new(),
            model: self.chat.model_name().to_string(),
            timestamp: Utc::now(),
            detected_terms,
            confidence: Confidence::Error,
            coverage: Coverage::Error,
            gap_recorded: false,
        }
    }

    /// Outcome counters for this session
    pub fn stats(&self) -> &QueryStats {
        self.tracker.stats()
    }

    /// Gaps recorded in this session
    pub fn gaps(&self) -> &[GapRecord] {
        self.tracker.gaps()
    }

    /// Write the session gap report under `dir`, if any gaps were recorded
    pub fn save_gap_report(&self, dir: &Path) -> Result<Option<PathBuf>> {
        self.tracker.save_report(dir)
    }

    /// Get current configuration
    pub fn config(&self) -> &RAGConfig {
        &self.config
    }

    /// Update configuration
    pub fn set_config(&mut self, config: RAGConfig) {
        self.context_builder.set_config(config.context.clone());
        self.config = config;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curriculum::ConceptRecord;
    use crate::rag::reranking::ReRanker;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct FixedRetriever {
        scores: Vec<(&'static str, f32)>,
    }

    impl Retriever for FixedRetriever {
        fn search(&self, _query: &str, top_k: usize, _min_score: f32) -> Result<Vec<SearchResult>> {
            Ok(self
                .scores
                .iter()
                .take(top_k)
                .enumerate()
                .map(|(i, (name, score))| SearchResult::new(ConceptRecord::named(*name), *score, i + 1))
                .collect())
        }
    }

    struct FailingRetriever;

    impl Retriever for FailingRetriever {
        fn search(&self, _query: &str, _top_k: usize, _min_score: f32) -> Result<Vec<SearchResult>> {
            Err(QnaError::RetrieverNotReady("unloaded".to_string()))
        }
    }

    /// Records every prompt; replies with a fixed answer or fails
    struct ScriptedChat {
        reply: Option<String>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedChat {
        fn replying(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Some(reply.to_string()),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                reply: None,
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedChat {
        fn model_name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, _system: &str, user: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(user.to_string());
            self.reply
                .clone()
                .ok_or_else(|| QnaError::ChatApi("HTTP 500: boom".to_string()))
        }
    }

    fn pipeline(scores: Vec<(&'static str, f32)>, chat: Arc<ScriptedChat>) -> RAGPipeline {
        RAGPipeline::new(Arc::new(FixedRetriever { scores }), chat)
    }

    #[tokio::test]
    async fn test_no_data_skips_chat() {
        let chat = ScriptedChat::replying("unused");
        let mut rag = pipeline(vec![("토닉", 0.49), ("도미넌트", 0.2)], chat.clone());

        let response = rag.answer("What is a cadence?").await;
        assert!(response.sources.is_empty());
        assert_eq!(response.confidence, Confidence::None);
        assert_eq!(response.coverage, Coverage::None);
        assert!(response.gap_recorded);
        assert!(response.answer.contains("What is a cadence?"));
        assert!(response.answer.contains("cadence"));
        assert_eq!(chat.calls(), 0);
        assert_eq!(rag.stats().no_data_answers, 1);
        assert_eq!(rag.gaps()[0].kind, GapKind::NoCoverage);
    }

    #[tokio::test]
    async fn test_high_confidence_answer() {
        let chat = ScriptedChat::replying("도미넌트는 [참고자료 1] ...");
        let mut rag = pipeline(
            vec![("도미넌트", 0.82), ("토닉", 0.75), ("버금딸림", 0.72)],
            chat.clone(),
        );

        let response = rag.answer("도미넌트란?").await;
        assert_eq!(response.confidence, Confidence::High);
        assert_eq!(response.coverage, Coverage::Complete);
        assert!(!response.gap_recorded);
        assert_eq!(response.model, "scripted");
        // only max_passages sources reach the prompt
        assert_eq!(response.sources.len(), 2);

        let prompt = chat.prompts.lock().unwrap()[0].clone();
        assert!(prompt.starts_with("질문: 도미넌트란?"));
        assert!(prompt.contains("[참고자료 2]"));
        assert!(!prompt.contains("[참고자료 3]"));
        assert_eq!(rag.stats().successful_answers, 1);
        assert!(rag.gaps().is_empty());
    }

    #[tokio::test]
    async fn test_partial_coverage_records_gap() {
        let chat = ScriptedChat::replying("부분 답변");
        let mut rag = pipeline(vec![("토닉", 0.6), ("도미넌트", 0.3)], chat.clone());

        let response = rag.answer("Tonic chord?").await;
        assert_eq!(response.confidence, Confidence::Medium);
        assert_eq!(response.coverage, Coverage::Partial);
        assert!(response.gap_recorded);
        assert_eq!(response.sources.len(), 1);
        assert_eq!(response.detected_terms, vec!["Tonic", "chord"]);
        assert_eq!(rag.gaps()[0].kind, GapKind::PartialCoverage);
        assert_eq!(chat.calls(), 1);
    }

    #[tokio::test]
    async fn test_retriever_error_becomes_error_response() {
        let chat = ScriptedChat::replying("unused");
        let mut rag = RAGPipeline::new(Arc::new(FailingRetriever), chat.clone());

        let response = rag.answer("토닉").await;
        assert!(response.is_error());
        assert_eq!(response.coverage, Coverage::Error);
        assert!(response.answer.starts_with("시스템 오류: "));
        assert!(response.sources.is_empty());
        assert_eq!(chat.calls(), 0);
        assert_eq!(rag.stats().errors, 1);
    }

    #[tokio::test]
    async fn test_chat_error_becomes_error_response() {
        let chat = ScriptedChat::failing();
        let mut rag = pipeline(vec![("토닉", 0.9)], chat.clone());

        let response = rag.answer("토닉").await;
        assert!(response.is_error());
        assert!(response.answer.contains("HTTP 500"));
        assert!(response.sources.is_empty());
        // no retry
        assert_eq!(chat.calls(), 1);
    }

    #[tokio::test]
    async fn test_stats_accumulate() {
        let chat = ScriptedChat::replying("ok");
        let mut rag = pipeline(vec![("토닉", 0.9)], chat);
        rag.answer("a").await;
        rag.answer("b").await;
        assert_eq!(rag.stats().total_queries, 2);
        assert_eq!(rag.stats().successful_answers, 2);
    }

    #[tokio::test]
    async fn test_floor_is_inclusive() {
        let chat = ScriptedChat::replying("ok");
        let mut rag = pipeline(vec![("토닉", 0.5)], chat.clone());

        let response = rag.answer("토닉").await;
        assert_eq!(response.sources.len(), 1);
        assert_eq!(response.confidence, Confidence::Medium);
        assert_eq!(response.coverage, Coverage::Partial);
        assert_eq!(chat.calls(), 1);
    }

    #[tokio::test]
    async fn test_high_confidence_is_inclusive() {
        let chat = ScriptedChat::replying("ok");
        let mut rag = pipeline(vec![("토닉", 0.7)], chat);

        let response = rag.answer("토닉").await;
        assert_eq!(response.confidence, Confidence::High);
        assert_eq!(response.coverage, Coverage::Complete);
        assert!(!response.gap_recorded);
    }

    #[tokio::test]
    async fn test_complete_answer_uses_only_high_tier_sources() {
        let chat = ScriptedChat::replying("ok");
        let mut rag = pipeline(vec![("도미넌트", 0.82), ("토닉", 0.6)], chat.clone());

        let response = rag.answer("도미넌트란?").await;
        assert_eq!(response.confidence, Confidence::High);
        assert_eq!(response.sources.len(), 1);
        assert_eq!(response.sources[0].record.concept_ko, "도미넌트");

        let prompt = chat.prompts.lock().unwrap()[0].clone();
        assert!(!prompt.contains("[참고자료 2]"));
    }

    /// Returns candidates already alias re-ranked, as `VectorRetriever` does
    struct ReRankedRetriever {
        scores: Vec<(&'static str, f32)>,
    }

    impl Retriever for ReRankedRetriever {
        fn search(&self, query: &str, _top_k: usize, _min_score: f32) -> Result<Vec<SearchResult>> {
            let candidates = self
                .scores
                .iter()
                .enumerate()
                .map(|(i, (name, score))| SearchResult::new(ConceptRecord::named(*name), *score, i + 1))
                .collect();
            Ok(ReRanker::new().rerank(query, candidates))
        }
    }

    #[tokio::test]
    async fn test_alias_boost_lifts_exact_match_over_floor() {
        let chat = ScriptedChat::replying("세컨더리 도미넌트는 ...");
        let retriever = ReRankedRetriever {
            scores: vec![("도미넌트 세븐스 코드", 0.46), ("세컨더리 도미넌트", 0.47)],
        };
        let mut rag = RAGPipeline::new(Arc::new(retriever), chat.clone());

        let response = rag.answer("세컨더리 도미넌트").await;

        // raw 0.47 is under the 0.5 floor; the exact-name boost brings it to 0.52
        assert_eq!(response.sources.len(), 1);
        assert_eq!(response.sources[0].record.concept_ko, "세컨더리 도미넌트");
        assert!(response.sources[0].base_score < 0.5);
        assert!(response.sources[0].score >= 0.5);
        assert_eq!(response.confidence, Confidence::Medium);
        assert_eq!(chat.calls(), 1);
    }

    #[test]
    fn test_no_data_answer_without_terms() {
        let text = no_data_answer("화성학", &[]);
        assert!(text.contains("\"화성학\""));
        assert!(text.contains("없음"));
    }
}
