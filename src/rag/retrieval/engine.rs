// Vector retriever: persisted embeddings -> flat index -> top-k -> alias re-rank
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::curriculum::ConceptRecord;
use crate::embedding::{Embedder, EmbeddingBundle};
use crate::errors::{QnaError, Result};
use crate::rag::reranking::{AliasMatch, ReRanker};
use crate::rag::retrieval::index::FlatIndex;

/// Search parameters for retrieval
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchParams {
    /// Maximum number of results to retrieve
    pub top_k: usize,
    /// Results whose raw similarity is below this are dropped before re-ranking
    pub min_score: f32,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            top_k: 5,
            min_score: 0.0,
        }
    }
}

/// One retrieved concept with its scores
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    #[serde(flatten)]
    pub record: ConceptRecord,
    /// Raw inner-product similarity
    pub base_score: f32,
    /// Similarity after alias boost
    pub score: f32,
    /// 1-based position after re-ranking
    pub rank: usize,
    #[serde(default)]
    pub alias_match: AliasMatch,
}

impl SearchResult {
    pub fn new(record: ConceptRecord, base_score: f32, rank: usize) -> Self {
        Self {
            record,
            base_score,
            score: base_score,
            rank,
            alias_match: AliasMatch::None,
        }
    }

    pub fn node_id(&self) -> Option<i64> {
        self.record.node_id
    }
}

/// Anything that can answer a top-k concept search
pub trait Retriever: Send + Sync {
    fn search(&self, query: &str, top_k: usize, min_score: f32) -> Result<Vec<SearchResult>>;
}

/// Lifecycle of a [`VectorRetriever`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RetrieverState {
    Unloaded,
    EmbeddingsLoaded,
    IndexBuilt,
    Ready,
}

impl fmt::Display for RetrieverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RetrieverState::Unloaded => "unloaded",
            RetrieverState::EmbeddingsLoaded => "embeddings loaded",
            RetrieverState::IndexBuilt => "index built",
            RetrieverState::Ready => "ready",
        };
        f.write_str(name)
    }
}

/// Retriever statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrieverStats {
    pub state: RetrieverState,
    pub model_name: Option<String>,
    pub num_embeddings: usize,
    pub dimension: Option<usize>,
}

/// Exact nearest-neighbour retriever over an embedding bundle.
///
/// `unloaded -> embeddings loaded -> index built -> ready`. Only a ready
/// retriever searches. The index is read-only once built; reloading rebuilds
/// it from scratch.
pub struct VectorRetriever {
    embedder: Arc<dyn Embedder>,
    reranker: ReRanker,
    bundle: Option<EmbeddingBundle>,
    index: Option<FlatIndex>,
    state: RetrieverState,
}

impl VectorRetriever {
    /// Create an unloaded retriever around a query embedder
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            reranker: ReRanker::new(),
            bundle: None,
            index: None,
            state: RetrieverState::Unloaded,
        }
    }

    pub fn with_reranker(mut self, reranker: ReRanker) -> Self {
        self.reranker = reranker;
        self
    }

    /// Load, index and prepare in one step
    pub fn open(path: &Path, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let mut retriever = Self::new(embedder);
        retriever.load(path)?;
        retriever.build_index()?;
        retriever.prepare()?;
        Ok(retriever)
    }

    /// Same as [`VectorRetriever::open`] for a bundle already in memory
    pub fn from_bundle(bundle: EmbeddingBundle, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let mut retriever = Self::new(embedder);
        retriever.load_bundle(bundle)?;
        retriever.build_index()?;
        retriever.prepare()?;
        Ok(retriever)
    }

    pub fn state(&self) -> RetrieverState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == RetrieverState::Ready
    }

    /// Read a persisted bundle. On failure the retriever is left unloaded.
    pub fn load(&mut self, path: &Path) -> Result<()> {
        match EmbeddingBundle::load(path) {
            Ok(bundle) => self.load_bundle(bundle),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to load embeddings");
                self.reset();
                Err(e)
            }
        }
    }

    pub fn load_bundle(&mut self, bundle: EmbeddingBundle) -> Result<()> {
        if let Err(e) = bundle.validate() {
            self.reset();
            return Err(e);
        }

        info!(
            vectors = bundle.len(),
            model = %bundle.model_name,
            "Embeddings loaded"
        );
        self.bundle = Some(bundle);
        self.index = None;
        self.state = RetrieverState::EmbeddingsLoaded;
        Ok(())
    }

    /// Build the flat inner-product index from the loaded vectors
    pub fn build_index(&mut self) -> Result<()> {
        let bundle = match (&self.bundle, self.state) {
            (Some(bundle), state) if state >= RetrieverState::EmbeddingsLoaded => bundle,
            _ => return Err(QnaError::RetrieverNotReady(self.state.to_string())),
        };

        let index = FlatIndex::from_vectors(bundle.dimension, &bundle.embeddings)?;
        debug!(rows = index.len(), dimension = index.dimension(), "Index built");

        self.index = Some(index);
        self.state = RetrieverState::IndexBuilt;
        Ok(())
    }

    /// Confirm the query embedder matches the corpus model, then go ready
    pub fn prepare(&mut self) -> Result<()> {
        if self.state < RetrieverState::IndexBuilt {
            return Err(QnaError::RetrieverNotReady(self.state.to_string()));
        }
        let bundle = self
            .bundle
            .as_ref()
            .ok_or_else(|| QnaError::RetrieverNotReady(self.state.to_string()))?;

        if bundle.model_name != self.embedder.model_name() {
            return Err(QnaError::ModelMismatch {
                corpus: bundle.model_name.clone(),
                query: self.embedder.model_name().to_string(),
            });
        }
        if bundle.dimension != self.embedder.dimension() {
            return Err(QnaError::DimensionMismatch {
                index: 0,
                expected: bundle.dimension,
                actual: self.embedder.dimension(),
            });
        }

        self.state = RetrieverState::Ready;
        Ok(())
    }

    /// Top-k concepts for `query`, alias re-ranked
    pub fn search(&self, query: &str, top_k: usize, min_score: f32) -> Result<Vec<SearchResult>> {
        let (bundle, index) = match (&self.bundle, &self.index, self.state) {
            (Some(bundle), Some(index), RetrieverState::Ready) => (bundle, index),
            _ => return Err(QnaError::RetrieverNotReady(self.state.to_string())),
        };

        let query_text = query.trim().to_lowercase();
        if query_text.is_empty() {
            return Ok(Vec::new());
        }

        let query_vector = self.embedder.embed(&query_text)?;
        let hits = index.search(&query_vector, top_k)?;

        let results: Vec<SearchResult> = hits
            .into_iter()
            .filter(|(_, score)| *score >= min_score)
            .filter_map(|(row, score)| {
                bundle
                    .records
                    .get(row)
                    .map(|record| (record.clone(), score))
            })
            .enumerate()
            .map(|(i, (record, score))| SearchResult::new(record, score, i + 1))
            .collect();

        debug!(query = %query, hits = results.len(), "Search complete");
        Ok(self.reranker.rerank(query, results))
    }

    /// Search with a parameter struct
    pub fn search_with_params(&self, query: &str, params: &SearchParams) -> Result<Vec<SearchResult>> {
        self.search(query, params.top_k, params.min_score)
    }

    pub fn records(&self) -> &[ConceptRecord] {
        self.bundle
            .as_ref()
            .map(|b| b.records.as_slice())
            .unwrap_or(&[])
    }

    pub fn stats(&self) -> RetrieverStats {
        RetrieverStats {
            state: self.state,
            model_name: self.bundle.as_ref().map(|b| b.model_name.clone()),
            num_embeddings: self.bundle.as_ref().map(|b| b.len()).unwrap_or(0),
            dimension: self.bundle.as_ref().map(|b| b.dimension),
        }
    }

    fn reset(&mut self) {
        self.bundle = None;
        self.index = None;
        self.state = RetrieverState::Unloaded;
    }
}

impl Retriever for VectorRetriever {
    fn search(&self, query: &str, top_k: usize, min_score: f32) -> Result<Vec<SearchResult>> {
        VectorRetriever::search(self, query, top_k, min_score)
    }
}
