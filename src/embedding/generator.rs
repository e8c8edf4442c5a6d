// Corpus embedding: tagged record text -> batched encode -> EmbeddingBundle
use tracing::info;

use crate::curriculum::ConceptRecord;
use crate::embedding::bundle::EmbeddingBundle;
use crate::embedding::engine::{l2_normalize, Embedder};
use crate::errors::{QnaError, Result};

/// Default number of texts per encode call
pub const DEFAULT_BATCH_SIZE: usize = 32;

/// Concatenate the record's fields into one tagged string.
///
/// Tags give the encoder a hint about which part of the text is the term
/// itself versus supporting explanation.
pub fn compose_text(record: &ConceptRecord) -> String {
    let parts = [
        ("[KEYWORD]", record.concept_ko.clone()),
        ("[KEYWORD_EN]", record.concept_en.clone()),
        ("[ALIAS]", record.aliases_joined()),
        ("[DEF]", record.definition.clone()),
        ("[LOGIC]", record.logic.clone()),
        ("[EX_NAME]", record.example_name.clone()),
        ("[EX_DESC]", record.example_description.clone()),
        ("[TIPS]", record.tips.clone()),
        ("[PREQ_KO]", record.prerequisites_ko.join("; ")),
        ("[PREQ_EN]", record.prerequisites_en.join("; ")),
    ];

    parts
        .iter()
        .map(|(tag, value)| format!("{} {}", tag, value))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Produces one normalized vector per concept record
pub struct EmbeddingGenerator<'a> {
    embedder: &'a dyn Embedder,
    batch_size: usize,
}

impl<'a> EmbeddingGenerator<'a> {
    pub fn new(embedder: &'a dyn Embedder) -> Self {
        Self {
            embedder,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(embedder: &'a dyn Embedder, batch_size: usize) -> Self {
        Self {
            embedder,
            batch_size: batch_size.max(1),
        }
    }

    /// Embed every record.
    ///
    /// `progress` receives `(records_done, records_total)` after each batch.
    pub fn generate<F>(&self, records: &[ConceptRecord], mut progress: F) -> Result<EmbeddingBundle>
    where
        F: FnMut(usize, usize),
    {
        let dimension = self.embedder.dimension();
        let texts: Vec<String> = records.iter().map(compose_text).collect();
        let mut embeddings = Vec::with_capacity(texts.len());

        info!(
            records = records.len(),
            model = self.embedder.model_name(),
            batch_size = self.batch_size,
            "Generating embeddings"
        );

        for batch in texts.chunks(self.batch_size) {
            let batch_refs: Vec<&str> = batch.iter().map(String::as_str).collect();
            let vectors = self.embedder.embed_batch(&batch_refs)?;

            if vectors.len() != batch.len() {
                return Err(QnaError::Embedding(format!(
                    "embedder returned {} vectors for {} texts",
                    vectors.len(),
                    batch.len()
                )));
            }

            for mut vector in vectors {
                if vector.len() != dimension {
                    return Err(QnaError::DimensionMismatch {
                        index: embeddings.len(),
                        expected: dimension,
                        actual: vector.len(),
                    });
                }
                l2_normalize(&mut vector);
                embeddings.push(vector);
            }

            progress(embeddings.len(), texts.len());
        }

        EmbeddingBundle::new(
            self.embedder.model_name(),
            dimension,
            embeddings,
            records.to_vec(),
        )
    }
}
