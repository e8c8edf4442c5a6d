// Embedding generation and persistence
//
// Components:
// - Engine: the Embedder trait plus a local candle sentence-embedding model
// - Generator: tagged record text, batched encoding
// - Bundle: vectors + records + model name on disk, validated on load

pub mod bundle;
pub mod engine;
pub mod generator;

pub use bundle::{needs_regeneration, BundleStats, EmbeddingBundle};
pub use engine::{l2_normalize, CandleEmbedder, Embedder, DEFAULT_MODEL_ID};
pub use generator::{compose_text, EmbeddingGenerator, DEFAULT_BATCH_SIZE};
