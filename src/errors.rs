//! Error types for musicqna
//!
//! Infrastructure failures (missing files, corrupt bundles, API errors) are
//! represented here. Insufficient evidence for an answer is not an error; the
//! assistant reports it through the response's coverage markers instead.

use thiserror::Error;

/// Main error type for the question-answering pipeline
#[derive(Error, Debug)]
pub enum QnaError {
    /// Curriculum JSON file does not exist
    #[error("Curriculum file not found: {0}")]
    CurriculumNotFound(String),

    /// Curriculum file exists but is not a JSON array of records
    #[error("Failed to parse curriculum {path}: {reason}")]
    CurriculumParse { path: String, reason: String },

    /// A single concept record failed validation
    #[error("Invalid concept record at index {index}: {reason}")]
    InvalidRecord { index: usize, reason: String },

    /// Embedding bundle file does not exist
    #[error("Embedding bundle not found: {0}")]
    EmbeddingsNotFound(String),

    /// Embedding bundle could not be deserialized
    #[error("Embedding bundle is corrupt: {0}")]
    BundleCorrupt(String),

    /// Vector count and record count disagree
    #[error("Embedding bundle holds {vectors} vectors for {records} records")]
    BundleMismatch { vectors: usize, records: usize },

    /// A vector has the wrong length
    #[error("Vector {index} has dimension {actual}, expected {expected}")]
    DimensionMismatch {
        index: usize,
        expected: usize,
        actual: usize,
    },

    /// Query embedder differs from the model that produced the corpus vectors
    #[error("Embedding model mismatch: corpus built with '{corpus}', query embedder is '{query}'")]
    ModelMismatch { corpus: String, query: String },

    /// Retriever used before it reached the required state
    #[error("Retriever is not ready (state: {0})")]
    RetrieverNotReady(String),

    /// Embedding backend failure (tokenizer, tensor ops, model load)
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Chat completion endpoint failure
    #[error("Chat API error: {0}")]
    ChatApi(String),

    /// API key environment variable unset or empty
    #[error("API key missing: {0}")]
    MissingApiKey(String),

    /// HTTP client errors
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Generic errors with context
    #[error("{0}")]
    Generic(String),
}

/// Result type alias for musicqna operations
pub type Result<T> = std::result::Result<T, QnaError>;

/// Convert anyhow errors to QnaError
impl From<anyhow::Error> for QnaError {
    fn from(err: anyhow::Error) -> Self {
        QnaError::Generic(format!("{:#}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundle_mismatch_display() {
        let err = QnaError::BundleMismatch {
            vectors: 10,
            records: 12,
        };
        assert!(err.to_string().contains("10"));
        assert!(err.to_string().contains("12"));
    }

    #[test]
    fn test_model_mismatch_display() {
        let err = QnaError::ModelMismatch {
            corpus: "model-a".to_string(),
            query: "model-b".to_string(),
        };
        assert!(err.to_string().contains("model-a"));
        assert!(err.to_string().contains("model-b"));
    }

    #[test]
    fn test_anyhow_conversion_keeps_context() {
        let err: QnaError = anyhow::anyhow!("root cause").context("outer").into();
        let text = err.to_string();
        assert!(text.contains("outer"));
        assert!(text.contains("root cause"));
    }
}
