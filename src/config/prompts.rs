//! Prompt templates for Glimpse.
//!
//! Prompts can be customized by placing TOML files in the custom prompts directory.

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::OnceLock;

/// Collection of all prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Prompts {
    pub study_guide: StudyGuidePrompts,
    pub answer: AnswerPrompts,
    pub evaluation: EvaluationPrompts,
    /// Custom variables from config, available in all prompts.
    #[serde(skip)]
    pub variables: HashMap<String, String>,
}

/// Prompts for the summary and quiz questions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StudyGuidePrompts {
    pub system: String,
    pub user: String,
}

impl Default for StudyGuidePrompts {
    fn default() -> Self {
        Self {
            system: r#"You are an AI assistant that analyzes video transcripts. Generate both a concise summary and {{question_count}} quiz questions.

For quiz questions, include timestamps (as a percentage between 0 and 100) indicating when in the video each question should be asked, i.e. right after the material it covers.

Format your response as a JSON object with "summary" and "quizQuestions" fields. "quizQuestions" is an array of objects, each containing "question" and "timestamp"."#
                .to_string(),

            user: r#"Process this transcript and generate a summary and quiz questions with timestamps (as a percentage between 0 and 100):

{{transcript}}"#
                .to_string(),
        }
    }
}

/// Prompts for answering a question about the paused video frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnswerPrompts {
    pub system: String,
    pub user: String,
}

impl Default for AnswerPrompts {
    fn default() -> Self {
        Self {
            system: r#"You are a helpful assistant that answers questions about video content based on a summary, relevant transcript sections and the current video frame.

Guidelines:
- Prefer the transcript sections and the frame over general knowledge
- If the context does not cover the question, say so clearly
- Keep answers concise and suited to a learner watching the video"#
                .to_string(),

            user: r#"Based on this context and the video frame, please answer: {{question}}

Context:
{{context}}"#
                .to_string(),
        }
    }
}

/// Prompts for giving feedback on a learner's answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationPrompts {
    pub system: String,
    pub user: String,
}

impl Default for EvaluationPrompts {
    fn default() -> Self {
        Self {
            system: "You are an educator evaluating student responses. Provide constructive feedback."
                .to_string(),
            user: r#"Question: {{question}}
Student's Answer: {{answer}}
Context: {{context}}

Evaluate this answer and provide feedback."#
                .to_string(),
        }
    }
}

impl Prompts {
    /// Load prompts from the default location, with optional custom directory and variables.
    pub fn load(
        custom_dir: Option<&str>,
        custom_variables: Option<&HashMap<String, String>>,
    ) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        if let Some(vars) = custom_variables {
            prompts.variables = vars.clone();
        }

        if let Some(dir) = custom_dir {
            let custom_path = PathBuf::from(shellexpand::tilde(dir).to_string());

            let study_guide_path = custom_path.join("study_guide.toml");
            if study_guide_path.exists() {
                let content = std::fs::read_to_string(&study_guide_path)?;
                prompts.study_guide = toml::from_str(&content)?;
            }

            let answer_path = custom_path.join("answer.toml");
            if answer_path.exists() {
                let content = std::fs::read_to_string(&answer_path)?;
                prompts.answer = toml::from_str(&content)?;
            }

            let evaluation_path = custom_path.join("evaluation.toml");
            if evaluation_path.exists() {
                let content = std::fs::read_to_string(&evaluation_path)?;
                prompts.evaluation = toml::from_str(&content)?;
            }
        }

        Ok(prompts)
    }

    /// Render a prompt template with the given variables.
    ///
    /// Placeholders are replaced in one left-to-right pass, so substituted
    /// values are never scanned again. Unknown placeholders are left as is.
    pub fn render(template: &str, vars: &HashMap<String, String>) -> String {
        static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
        let placeholder =
            PLACEHOLDER.get_or_init(|| Regex::new(r"\{\{(\w+)\}\}").expect("static regex"));

        placeholder
            .replace_all(template, |caps: &Captures| match vars.get(&caps[1]) {
                Some(value) => value.clone(),
                None => caps[0].to_string(),
            })
            .into_owned()
    }

    /// Render a prompt template with both provided variables and custom config variables.
    /// Provided variables take precedence over custom config variables.
    pub fn render_with_custom(&self, template: &str, vars: &HashMap<String, String>) -> String {
        let mut merged = self.variables.clone();
        for (key, value) in vars {
            merged.insert(key.clone(), value.clone());
        }
        Self::render(template, &merged)
    }
}
