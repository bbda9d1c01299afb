//! Error types for Glimpse.

use async_openai::error::OpenAIError;
use thiserror::Error;

/// API error types that the same request will hit again on retry.
const REJECTED_API_ERRORS: &[&str] = &[
    "invalid_request_error",
    "authentication_error",
    "permission_error",
    "not_found_error",
    "insufficient_quota",
];

/// Library-level error type for Glimpse operations.
#[derive(Error, Debug)]
pub enum GlimpseError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Transcript source error: {0}")]
    TranscriptSource(String),

    #[error("Transcript not found: {0}")]
    TranscriptNotFound(String),

    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    #[error("Vector store error: {0}")]
    VectorStore(String),

    #[error("Index build failed: {0}")]
    BuildFailed(String),

    #[error("Retrieval failed: {0}")]
    RetrievalFailed(String),

    #[error("No transcript has been indexed yet. Process a video first.")]
    NotInitialized,

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("No relevant context found. Please try a different question.")]
    NoRelevantContext,

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("Tutor error: {0}")]
    Tutor(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("OpenAI API error: {0}")]
    OpenAI(String),

    #[error("OpenAI rejected the request: {0}")]
    OpenAIRejected(String),

    #[error("External tool not found: {0}. Please install it and ensure it's in your PATH.")]
    ToolNotFound(String),

    #[error("External tool failed: {0}")]
    ToolFailed(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl GlimpseError {
    /// Classify an OpenAI client error, prefixing the message with `context`.
    ///
    /// Bad requests, bad credentials and exhausted quota become
    /// `OpenAIRejected`; everything else stays `OpenAI`.
    pub fn from_openai(context: &str, e: OpenAIError) -> Self {
        let rejected = match &e {
            OpenAIError::ApiError(api) => api
                .r#type
                .as_deref()
                .is_some_and(|kind| REJECTED_API_ERRORS.contains(&kind)),
            OpenAIError::InvalidArgument(_) => true,
            _ => false,
        };

        let message = format!("{}: {}", context, e);
        if rejected {
            GlimpseError::OpenAIRejected(message)
        } else {
            GlimpseError::OpenAI(message)
        }
    }

    /// Whether retrying the same call may succeed.
    ///
    /// Network hiccups, provider-side failures and timeouts qualify.
    /// Configuration and input problems never do.
    pub fn is_transient(&self) -> bool {
        match self {
            GlimpseError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            GlimpseError::OpenAI(_) | GlimpseError::Embedding(_) | GlimpseError::Timeout(_) => {
                true
            }
            _ => false,
        }
    }
}

/// Result type alias for Glimpse operations.
pub type Result<T> = std::result::Result<T, GlimpseError>;
