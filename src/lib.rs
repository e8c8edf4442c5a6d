//! musicqna - Retrieval-grounded music theory question answering
//!
//! Answers questions from a curated curriculum of music-theory concepts.
//! Concepts are embedded once into a persisted bundle; queries are embedded
//! with the same model, matched by inner product, boosted by literal name and
//! alias matches, and handed to a hosted chat model with a prompt that
//! restricts the answer to the retrieved references.
//!
//! # Architecture
//!
//! - **curriculum**: concept records and the JSON loader
//! - **embedding**: embedder trait, candle sentence-embedding engine, bundle persistence
//! - **rag**: flat index, retriever lifecycle, alias re-ranking, prompt context, answer pipeline
//! - **llm**: chat-completion client
//! - **session**: knowledge-gap tracking and gap report analysis
//! - **eval**: retrieval evaluation against labelled node ids

pub mod errors;

// Re-export commonly used types
pub use errors::{QnaError, Result};

pub mod cli;
pub mod config;

// Data and embeddings
pub mod curriculum;
pub mod embedding;

// Retrieval-augmented answering
pub mod llm;
pub mod rag;
pub mod terms;

// Gap tracking and evaluation
pub mod eval;
pub mod session;
