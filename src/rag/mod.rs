// Retrieval-augmented answering over the concept curriculum
//
// Components:
// - Retrieval: Flat inner-product index and the retriever lifecycle
// - Re-ranking: Alias/name boost on top of semantic similarity
// - Context Builder: Bounded reference blocks for the prompt
// - Pipeline: Grounding tiers, chat completion, no-data and error responses

pub mod context;
pub mod pipeline;
pub mod reranking;
pub mod retrieval;

// Re-export key types
pub use context::{truncate_field, ContextBuilder, ContextConfig};
pub use pipeline::{Confidence, Coverage, RAGConfig, RAGPipeline, RagResponse};
pub use reranking::{AliasMatch, ReRankConfig, ReRanker};
pub use retrieval::{Retriever, RetrieverState, SearchParams, SearchResult, VectorRetriever};
