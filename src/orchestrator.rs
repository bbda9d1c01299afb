//! Session context for Glimpse.
//!
//! Ties transcript sources, the retrieval store and the tutor together. Each
//! orchestrator owns its own store, so one process can host several.

use crate::chunking::Chunk;
use crate::config::{Prompts, Settings};
use crate::embedding::{Embedder, OpenAIEmbedder};
use crate::error::{GlimpseError, Result};
use crate::retrieval::{IndexBackend, RetrievalStore, StoreState};
use crate::transcript::{
    extract_video_id, parse_input, resolve_in_dir, LocalSource, Transcript, TranscriptSource,
    YoutubeSource,
};
use crate::tutor::{AskRequest, OpenAITutor, QuizQuestion, Tutor};
use crate::vector_store::Neighbor;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, instrument};

/// Result of processing a video or transcript file.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessResult {
    /// YouTube video id or local file name.
    pub video_id: String,
    pub transcript: String,
    pub summary: String,
    pub quiz_questions: Vec<QuizQuestion>,
    /// Number of chunks in the new index.
    pub chunks_indexed: usize,
    /// Video length in seconds, when captions carry timing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
}

/// The main orchestrator for a Glimpse session.
pub struct Orchestrator {
    settings: Settings,
    store: RetrievalStore,
    tutor: Arc<dyn Tutor>,
}

impl Orchestrator {
    /// Create an orchestrator backed by OpenAI, reopening any persisted index.
    pub async fn new(settings: Settings) -> Result<Self> {
        let prompts = Prompts::load(
            settings.prompts.custom_dir.as_deref(),
            Some(&settings.prompts.variables),
        )?;

        let embedder: Arc<dyn Embedder> = Arc::new(OpenAIEmbedder::with_config(
            &settings.embedding.model,
            settings.embedding.dimensions as usize,
        )?);
        let tutor: Arc<dyn Tutor> = Arc::new(OpenAITutor::new(settings.tutor.clone(), prompts)?);

        let store = RetrievalStore::open(embedder, IndexBackend::from_settings(&settings), &settings).await?;

        Ok(Self {
            settings,
            store,
            tutor,
        })
    }

    /// Create an orchestrator with custom components.
    pub fn with_components(settings: Settings, store: RetrievalStore, tutor: Arc<dyn Tutor>) -> Self {
        Self {
            settings,
            store,
            tutor,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn store(&self) -> &RetrievalStore {
        &self.store
    }

    pub async fn state(&self) -> StoreState {
        self.store.state().await
    }

    /// Fetch a video's transcript (or load a transcript file), then index it.
    #[instrument(skip(self), fields(input = %input))]
    pub async fn process_video(&self, input: &str) -> Result<ProcessResult> {
        let (source, id) = parse_input(input, &self.settings.transcript.languages).ok_or_else(|| {
            GlimpseError::InvalidInput(format!("Invalid YouTube URL or transcript file: {}", input))
        })?;

        info!("Fetching {} transcript for {}", source.kind(), id);
        let transcript = source.fetch(&id).await?;
        self.process_transcript(transcript).await
    }

    /// Fetch and index YouTube captions. Local files are not accepted.
    #[instrument(skip(self), fields(input = %input))]
    pub async fn process_youtube(&self, input: &str) -> Result<ProcessResult> {
        let id = extract_video_id(input)
            .ok_or_else(|| GlimpseError::InvalidInput(format!("Invalid YouTube URL: {}", input)))?;

        info!("Fetching youtube transcript for {}", id);
        let source = YoutubeSource::new(self.settings.transcript.languages.clone());
        let transcript = source.fetch(&id).await?;
        self.process_transcript(transcript).await
    }

    /// Index a transcript file named `name` in the directory of
    /// `transcript.local_path`, or that file itself when `name` is `None`.
    #[instrument(skip(self))]
    pub async fn process_local_named(&self, name: Option<&str>) -> Result<ProcessResult> {
        let Some(name) = name else {
            return self.process_local(None).await;
        };

        let default_path = Settings::expand_path(&self.settings.transcript.local_path);
        let dir = match default_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let path = resolve_in_dir(dir, name)?;
        self.process_local(Some(&path)).await
    }

    /// Index a local transcript file, `transcript.local_path` when `path` is `None`.
    #[instrument(skip(self))]
    pub async fn process_local(&self, path: Option<&Path>) -> Result<ProcessResult> {
        let default_path = Settings::expand_path(&self.settings.transcript.local_path);
        let path = path.unwrap_or(&default_path);

        let transcript = LocalSource::new().load(path).await?;
        self.process_transcript(transcript).await
    }

    /// Write the study guide and replace the index for `transcript`.
    pub async fn process_transcript(&self, transcript: Transcript) -> Result<ProcessResult> {
        let guide = self.tutor.study_guide(&transcript).await?;
        let chunks: Vec<Chunk> = self.store.create_vector_store(&transcript.text).await?;

        info!(
            "Processed {}: {} chunks, {} quiz questions",
            transcript.source_id,
            chunks.len(),
            guide.quiz_questions.len()
        );

        Ok(ProcessResult {
            duration_seconds: transcript.duration_seconds(),
            video_id: transcript.source_id,
            transcript: transcript.text,
            summary: guide.summary,
            quiz_questions: guide.quiz_questions,
            chunks_indexed: chunks.len(),
        })
    }

    /// Answer a question about the paused video.
    #[instrument(skip(self, request), fields(question = %request.question))]
    pub async fn ask(&self, request: &AskRequest) -> Result<String> {
        if request.question.trim().is_empty() {
            return Err(GlimpseError::InvalidInput("Question missing".to_string()));
        }
        request.screenshot_url()?;

        let k = request.k.unwrap_or(self.settings.retrieval.top_k);
        let chunks = self.store.get_relevant_chunks(&request.question, k).await?;
        if chunks.is_empty() {
            return Err(GlimpseError::NoRelevantContext);
        }

        self.tutor.answer(request, &chunks).await
    }

    /// Chunks closest to `query`, with distances.
    pub async fn search(&self, query: &str, k: Option<usize>) -> Result<Vec<Neighbor>> {
        let k = k.unwrap_or(self.settings.retrieval.top_k);
        self.store.search(query, k).await
    }

    /// Feedback on a learner's answer to a quiz question.
    pub async fn evaluate(&self, question: &str, answer: &str, context: &str) -> Result<String> {
        if question.trim().is_empty() || answer.trim().is_empty() {
            return Err(GlimpseError::InvalidInput(
                "Both a question and an answer are required".to_string(),
            ));
        }
        self.tutor.evaluate(question, answer, context).await
    }
}
