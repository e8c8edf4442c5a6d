// Persisted corpus embeddings: vectors, the records they encode, and the model name
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use crate::curriculum::ConceptRecord;
use crate::errors::{QnaError, Result};

/// Vectors plus the records they were computed from.
///
/// `embeddings[i]` encodes `records[i]`. [`EmbeddingBundle::validate`] checks
/// that both arrays have the same length and every vector has `dimension`
/// entries; [`EmbeddingBundle::load`] runs it before returning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingBundle {
    pub model_name: String,
    pub dimension: usize,
    pub embeddings: Vec<Vec<f32>>,
    #[serde(alias = "chunks")]
    pub records: Vec<ConceptRecord>,
}

/// Summary of a bundle's vectors
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleStats {
    pub model_name: String,
    pub num_embeddings: usize,
    pub dimension: usize,
    pub mean_norm: f32,
    pub std_norm: f32,
}

impl EmbeddingBundle {
    pub fn new(
        model_name: impl Into<String>,
        dimension: usize,
        embeddings: Vec<Vec<f32>>,
        records: Vec<ConceptRecord>,
    ) -> Result<Self> {
        let bundle = Self {
            model_name: model_name.into(),
            dimension,
            embeddings,
            records,
        };
        bundle.validate()?;
        Ok(bundle)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Count parity and uniform dimension
    pub fn validate(&self) -> Result<()> {
        if self.embeddings.len() != self.records.len() {
            return Err(QnaError::BundleMismatch {
                vectors: self.embeddings.len(),
                records: self.records.len(),
            });
        }

        if let Some((index, vector)) = self
            .embeddings
            .iter()
            .enumerate()
            .find(|(_, v)| v.len() != self.dimension)
        {
            return Err(QnaError::DimensionMismatch {
                index,
                expected: self.dimension,
                actual: vector.len(),
            });
        }

        Ok(())
    }

    /// Serialize to disk, creating parent directories
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_vec(self)?;
        fs::write(path, json)?;
        info!(
            path = %path.display(),
            vectors = self.embeddings.len(),
            model = %self.model_name,
            "Embedding bundle saved"
        );
        Ok(())
    }

    /// Read a bundle from disk and validate it
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(QnaError::EmbeddingsNotFound(path.display().to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let bundle: EmbeddingBundle = serde_json::from_slice(&bytes)
            .map_err(|e| QnaError::BundleCorrupt(format!("{}: {}", path.display(), e)))?;
        bundle.validate()?;

        debug!(
            path = %path.display(),
            vectors = bundle.embeddings.len(),
            model = %bundle.model_name,
            "Embedding bundle loaded"
        );
        Ok(bundle)
    }

    pub fn stats(&self) -> BundleStats {
        let norms: Vec<f32> = self
            .embeddings
            .iter()
            .map(|v| v.iter().map(|x| x * x).sum::<f32>().sqrt())
            .collect();

        let (mean_norm, std_norm) = if norms.is_empty() {
            (0.0, 0.0)
        } else {
            let n = norms.len() as f32;
            let mean = norms.iter().sum::<f32>() / n;
            let variance = norms.iter().map(|x| (x - mean).powi(2)).sum::<f32>() / n;
            (mean, variance.sqrt())
        };

        BundleStats {
            model_name: self.model_name.clone(),
            num_embeddings: self.embeddings.len(),
            dimension: self.dimension,
            mean_norm,
            std_norm,
        }
    }
}

/// Whether the bundle must be rebuilt: missing, or older than the curriculum
pub fn needs_regeneration(curriculum: &Path, bundle: &Path) -> Result<bool> {
    if !bundle.exists() {
        return Ok(true);
    }
    let curriculum_modified = fs::metadata(curriculum)?.modified()?;
    let bundle_modified = fs::metadata(bundle)?.modified()?;
    Ok(curriculum_modified > bundle_modified)
}
