//! Configuration settings for Glimpse.

use crate::error::{GlimpseError, Result};
use crate::vector_store::DistanceMetric;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub embedding: EmbeddingSettings,
    pub retrieval: RetrievalSettings,
    pub tutor: TutorSettings,
    pub transcript: TranscriptSettings,
    pub prompts: PromptSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory for storing application data.
    pub data_dir: String,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            data_dir: "~/.glimpse".to_string(),
            log_level: "warn".to_string(),
        }
    }
}

/// Embedding generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// Embedding provider (openai).
    pub provider: String,
    /// Embedding model to use.
    pub model: String,
    /// Embedding dimensions.
    pub dimensions: u32,
    /// Inputs per embedding request.
    pub batch_size: usize,
    /// Maximum embedding requests in flight during an index build.
    pub max_in_flight: usize,
    /// Total attempts per request (first try included).
    pub retry_attempts: usize,
    /// Base delay for exponential backoff between attempts.
    pub retry_backoff_ms: u64,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "text-embedding-3-small".to_string(),
            dimensions: 1536,
            batch_size: 16,
            max_in_flight: 4,
            retry_attempts: 2,
            retry_backoff_ms: 500,
        }
    }
}

/// Index backend type.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IndexBackendKind {
    /// SQLite files under `index_dir`, survives restarts.
    #[default]
    Sqlite,
    /// Process memory only.
    Memory,
}

impl std::str::FromStr for IndexBackendKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sqlite" => Ok(IndexBackendKind::Sqlite),
            "memory" => Ok(IndexBackendKind::Memory),
            _ => Err(format!("Unknown index backend: {}", s)),
        }
    }
}

impl std::fmt::Display for IndexBackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IndexBackendKind::Sqlite => write!(f, "sqlite"),
            IndexBackendKind::Memory => write!(f, "memory"),
        }
    }
}

/// Chunking, indexing and retrieval settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    /// Words per chunk.
    pub chunk_size: usize,
    /// Words shared between consecutive chunks.
    pub chunk_overlap: usize,
    /// How many trailing words of a chunk may be given up to end on a sentence.
    pub boundary_lookback: usize,
    /// Chunks returned per question.
    pub top_k: usize,
    /// Distance metric used by the index.
    pub metric: DistanceMetric,
    /// Index backend (sqlite, memory).
    pub backend: IndexBackendKind,
    /// Directory holding the on-disk index (sqlite backend).
    pub index_dir: String,
    /// Upper bound for a whole index build.
    pub build_timeout_secs: u64,
    /// Upper bound for a single retrieval.
    pub query_timeout_secs: u64,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            chunk_size: 100,
            chunk_overlap: 20,
            boundary_lookback: 10,
            top_k: 3,
            metric: DistanceMetric::Cosine,
            backend: IndexBackendKind::Sqlite,
            index_dir: "~/.glimpse/index".to_string(),
            build_timeout_secs: 300,
            query_timeout_secs: 30,
        }
    }
}

impl RetrievalSettings {
    pub fn build_timeout(&self) -> Duration {
        Duration::from_secs(self.build_timeout_secs)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }
}

/// Settings for the generative tutor (summaries, quizzes, answers).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TutorSettings {
    /// Model for the summary, quiz questions and answer evaluation.
    pub model: String,
    /// Image-capable model for answering questions about a video frame.
    pub vision_model: String,
    /// Sampling temperature for answers.
    pub temperature: f32,
    /// Number of quiz questions to generate.
    pub quiz_questions: usize,
}

impl Default for TutorSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4o".to_string(),
            vision_model: "gpt-4o".to_string(),
            temperature: 0.7,
            quiz_questions: 3,
        }
    }
}

/// Transcript acquisition settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptSettings {
    /// Caption languages to request, in order of preference.
    pub languages: Vec<String>,
    /// Transcript file used by the local-video flow when no path is given.
    pub local_path: String,
}

impl Default for TranscriptSettings {
    fn default() -> Self {
        Self {
            languages: vec!["en".to_string()],
            local_path: "transcript.txt".to_string(),
        }
    }
}

/// Prompt customization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct PromptSettings {
    /// Directory for custom prompts (overrides defaults).
    pub custom_dir: Option<String>,
    /// Custom variables available in all prompts as {{variable_name}}.
    pub variables: std::collections::HashMap<String, String>,
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        let settings = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Settings::default()
        };

        settings.validate()?;
        Ok(settings)
    }

    /// Reject settings the retrieval core cannot run with.
    pub fn validate(&self) -> Result<()> {
        let r = &self.retrieval;
        if r.chunk_size == 0 || r.chunk_overlap >= r.chunk_size {
            return Err(GlimpseError::InvalidConfiguration(format!(
                "retrieval.chunk_size ({}) must be greater than retrieval.chunk_overlap ({})",
                r.chunk_size, r.chunk_overlap
            )));
        }
        if r.top_k == 0 {
            return Err(GlimpseError::InvalidConfiguration(
                "retrieval.top_k must be at least 1".to_string(),
            ));
        }
        if r.build_timeout_secs == 0 || r.query_timeout_secs == 0 {
            return Err(GlimpseError::InvalidConfiguration(
                "retrieval timeouts must be greater than zero".to_string(),
            ));
        }

        let e = &self.embedding;
        if e.batch_size == 0 || e.max_in_flight == 0 || e.retry_attempts == 0 {
            return Err(GlimpseError::InvalidConfiguration(
                "embedding.batch_size, max_in_flight and retry_attempts must be at least 1"
                    .to_string(),
            ));
        }
        if e.dimensions == 0 {
            return Err(GlimpseError::InvalidConfiguration(
                "embedding.dimensions must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    /// Save settings to the default configuration file.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::default_config_path())
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| GlimpseError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("glimpse")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded data directory path.
    pub fn data_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.data_dir)
    }

    /// Get the expanded index directory path.
    pub fn index_dir(&self) -> PathBuf {
        Self::expand_path(&self.retrieval.index_dir)
    }
}
