//! Configuration module for Glimpse.
//!
//! Handles loading and managing application settings and prompt templates.

mod prompts;
mod settings;

pub use prompts::{AnswerPrompts, EvaluationPrompts, Prompts, StudyGuidePrompts};
pub use settings::{
    EmbeddingSettings, GeneralSettings, IndexBackendKind, PromptSettings, RetrievalSettings,
    Settings, TranscriptSettings, TutorSettings,
};
