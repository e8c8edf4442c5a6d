use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::embedding::{DEFAULT_BATCH_SIZE, DEFAULT_MODEL_ID};
use crate::llm::{ChatClientConfig, DEFAULT_BASE_URL, DEFAULT_CHAT_MODEL};
use crate::rag::{ContextConfig, RAGConfig, ReRankConfig, SearchParams};

/// Environment variable overriding `llm.model`
pub const MODEL_ENV_VAR: &str = "OPENAI_MODEL";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub assistant: AssistantConfig,
    #[serde(default)]
    pub llm: LlmConfig,
}

/// Data file locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub curriculum: PathBuf,
    pub embeddings: PathBuf,
    pub gaps_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            curriculum: PathBuf::from("data/musicqna/processed/music_theory_curriculum.json"),
            embeddings: PathBuf::from("data/musicqna/embeddings/curriculum_embeddings.json"),
            gaps_dir: PathBuf::from("data/musicqna/gaps"),
        }
    }
}

/// Sentence-embedding model settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub model: String,
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL_ID.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

/// Vector search and alias re-ranking
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
    pub min_score: f32,
    pub alias_boost: f32,
    pub partial_weight: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        let search = SearchParams::default();
        let rerank = ReRankConfig::default();
        Self {
            top_k: search.top_k,
            min_score: search.min_score,
            alias_boost: rerank.alias_boost,
            partial_weight: rerank.partial_weight,
        }
    }
}

/// Grounding thresholds and prompt budget
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    pub min_similarity: f32,
    pub high_confidence: f32,
    pub max_passages: usize,
    pub field_char_budget: usize,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        let rag = RAGConfig::default();
        Self {
            min_similarity: rag.min_similarity,
            high_confidence: rag.high_confidence,
            max_passages: rag.context.max_passages,
            field_char_budget: rag.context.field_char_budget,
        }
    }
}

/// Hosted chat-completion endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    /// Name of the environment variable holding the API key
    pub api_key_env: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_CHAT_MODEL.to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            max_tokens: 1000,
            temperature: 0.7,
            timeout_secs: 60,
        }
    }
}

impl Config {
    /// Load configuration from file, creating default if it doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            let config = Config::default();
            config.save_to(&config_path)?;
            return Ok(config);
        }

        Self::load_from(&config_path)
    }

    /// Load from an explicit path; the file must exist
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let config: Config = toml::from_str(&contents).context("Failed to parse config file")?;

        Ok(config)
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Save configuration to `path`
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let toml_string = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(path, toml_string).context("Failed to write config file")?;

        Ok(())
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not determine home directory")?;

        Ok(home.join(".musicqna").join("config.toml"))
    }

    /// Apply environment overrides
    pub fn apply_env(&mut self) {
        self.apply_model_override(std::env::var(MODEL_ENV_VAR).ok());
    }

    /// Replace the chat model when an override is set and non-blank
    pub fn apply_model_override(&mut self, model: Option<String>) {
        if let Some(model) = model.filter(|m| !m.trim().is_empty()) {
            self.llm.model = model;
        }
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.retrieval.top_k == 0 {
            bail!("retrieval.top_k must be at least 1");
        }
        if self.embedding.batch_size == 0 {
            bail!("embedding.batch_size must be at least 1");
        }
        if self.assistant.max_passages == 0 || self.assistant.field_char_budget == 0 {
            bail!("assistant.max_passages and assistant.field_char_budget must be positive");
        }
        if self.assistant.high_confidence < self.assistant.min_similarity {
            bail!(
                "assistant.high_confidence ({}) is below assistant.min_similarity ({})",
                self.assistant.high_confidence,
                self.assistant.min_similarity
            );
        }
        if self.retrieval.alias_boost < 0.0 || self.retrieval.partial_weight < 0.0 {
            bail!("retrieval.alias_boost and retrieval.partial_weight must not be negative");
        }
        Ok(())
    }

    pub fn search_params(&self) -> SearchParams {
        SearchParams {
            top_k: self.retrieval.top_k,
            min_score: self.retrieval.min_score,
        }
    }

    pub fn rerank_config(&self) -> ReRankConfig {
        ReRankConfig {
            alias_boost: self.retrieval.alias_boost,
            partial_weight: self.retrieval.partial_weight,
        }
    }

    pub fn rag_config(&self) -> RAGConfig {
        RAGConfig {
            search: self.search_params(),
            context: ContextConfig {
                max_passages: self.assistant.max_passages,
                field_char_budget: self.assistant.field_char_budget,
            },
            min_similarity: self.assistant.min_similarity,
            high_confidence: self.assistant.high_confidence,
        }
    }

    pub fn chat_client_config(&self) -> ChatClientConfig {
        ChatClientConfig {
            base_url: self.llm.base_url.clone(),
            model: self.llm.model.clone(),
            max_tokens: self.llm.max_tokens,
            temperature: self.llm.temperature,
            timeout_secs: self.llm.timeout_secs,
        }
    }
}
