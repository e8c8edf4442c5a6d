// Retrieval: flat vector index and the retriever built on it
pub mod engine;
pub mod index;

pub use engine::{
    Retriever, RetrieverState, RetrieverStats, SearchParams, SearchResult, VectorRetriever,
};
pub use index::FlatIndex;
