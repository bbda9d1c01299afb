//! The generative side of Glimpse: study guides, answers and feedback.
//!
//! Retrieval decides *what* the model sees; the tutor decides how it is asked.

mod openai;

pub use openai::OpenAITutor;

use crate::error::{GlimpseError, Result};
use crate::transcript::Transcript;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One comprehension question, placed at a point in the video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub question: String,
    /// Position in the video as a percentage (0-100).
    pub timestamp: f64,
}

/// Summary and quiz questions for a transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyGuide {
    pub summary: String,
    #[serde(default)]
    pub quiz_questions: Vec<QuizQuestion>,
}

impl StudyGuide {
    /// Parse the model's JSON reply.
    ///
    /// Timestamps are clamped into 0-100 and blank questions dropped.
    pub fn from_json(raw: &str) -> Result<Self> {
        let mut guide: StudyGuide = serde_json::from_str(raw.trim())
            .map_err(|e| GlimpseError::Tutor(format!("malformed study guide: {}", e)))?;

        guide.quiz_questions.retain(|q| !q.question.trim().is_empty());
        for question in &mut guide.quiz_questions {
            question.timestamp = if question.timestamp.is_finite() {
                question.timestamp.clamp(0.0, 100.0)
            } else {
                0.0
            };
        }
        guide
            .quiz_questions
            .sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));

        Ok(guide)
    }
}

/// Who said a line of the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnKind {
    Question,
    Answer,
}

/// One earlier message of the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    #[serde(rename = "type")]
    pub kind: TurnKind,
    pub content: String,
}

/// A question about the paused video.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AskRequest {
    pub question: String,
    #[serde(default)]
    pub summary: String,
    /// Base64 JPEG of the current frame, bare or as a `data:` URL.
    #[serde(default)]
    pub current_screenshot: Option<String>,
    #[serde(default)]
    pub messages: Vec<ChatTurn>,
    /// Number of transcript chunks to retrieve.
    #[serde(default)]
    pub k: Option<usize>,
}

impl AskRequest {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            ..Self::default()
        }
    }

    /// The screenshot as a data URL the vision model accepts.
    ///
    /// Fails with `InvalidInput` when no frame was captured.
    pub fn screenshot_url(&self) -> Result<String> {
        let screenshot = self
            .current_screenshot
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                GlimpseError::InvalidInput(
                    "No screenshot available. Please pause the video first.".to_string(),
                )
            })?;

        if screenshot.starts_with("data:") {
            Ok(screenshot.to_string())
        } else {
            Ok(format!("data:image/jpeg;base64,{}", screenshot))
        }
    }
}

/// Assemble the text context for an answer.
pub fn format_context(summary: &str, messages: &[ChatTurn], chunks: &[String]) -> String {
    let history = if messages.is_empty() {
        "(none)".to_string()
    } else {
        messages
            .iter()
            .map(|turn| {
                let who = match turn.kind {
                    TurnKind::Question => "Learner",
                    TurnKind::Answer => "Tutor",
                };
                format!("{}: {}", who, turn.content)
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    let sections = chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| format!("[{}] {}", i + 1, chunk))
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "Video Summary: {}\n\nPrevious messages:\n{}\n\nRelevant Transcript Sections:\n{}",
        summary, history, sections
    )
}

/// Trait for the generative tutor.
#[async_trait]
pub trait Tutor: Send + Sync {
    /// Summarize a transcript and write quiz questions for it.
    async fn study_guide(&self, transcript: &Transcript) -> Result<StudyGuide>;

    /// Answer a question from the retrieved chunks and the current frame.
    async fn answer(&self, request: &AskRequest, chunks: &[String]) -> Result<String>;

    /// Give feedback on a learner's answer.
    async fn evaluate(&self, question: &str, answer: &str, context: &str) -> Result<String>;
}
