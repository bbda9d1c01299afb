//! OpenAI chat-completions tutor.

use super::{format_context, AskRequest, StudyGuide, Tutor};
use crate::config::{Prompts, TutorSettings};
use crate::error::{GlimpseError, Result};
use crate::openai::create_client;
use crate::transcript::Transcript;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestMessageContentPartImageArgs,
    ChatCompletionRequestMessageContentPartTextArgs, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, ChatCompletionRequestUserMessageContent,
    ChatCompletionRequestUserMessageContentPart, CreateChatCompletionRequest,
    CreateChatCompletionRequestArgs, ImageDetail, ImageUrlArgs, ResponseFormat,
};
use async_trait::async_trait;
use std::collections::HashMap;
use tracing::{debug, info, instrument};

fn tutor_error(e: impl std::fmt::Display) -> GlimpseError {
    GlimpseError::Tutor(e.to_string())
}

/// Tutor backed by OpenAI chat models.
pub struct OpenAITutor {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    settings: TutorSettings,
    prompts: Prompts,
}

impl OpenAITutor {
    /// Create a new tutor.
    pub fn new(settings: TutorSettings, prompts: Prompts) -> Result<Self> {
        Ok(Self {
            client: create_client()?,
            settings,
            prompts,
        })
    }

    fn system_message(content: &str) -> Result<ChatCompletionRequestMessage> {
        Ok(ChatCompletionRequestSystemMessageArgs::default()
            .content(content.to_string())
            .build()
            .map_err(tutor_error)?
            .into())
    }

    fn user_message(content: String) -> Result<ChatCompletionRequestMessage> {
        Ok(ChatCompletionRequestUserMessageArgs::default()
            .content(content)
            .build()
            .map_err(tutor_error)?
            .into())
    }

    async fn complete(&self, request: CreateChatCompletionRequest) -> Result<String> {
        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| GlimpseError::from_openai("Failed to generate response", e))?;

        let content = response
            .choices
            .first()
            .and_then(|c| c.message.content.as_ref())
            .ok_or_else(|| GlimpseError::Tutor("Empty response from model".to_string()))?;

        Ok(content.trim().to_string())
    }
}

#[async_trait]
impl Tutor for OpenAITutor {
    #[instrument(skip(self, transcript), fields(source = %transcript.source_id))]
    async fn study_guide(&self, transcript: &Transcript) -> Result<StudyGuide> {
        let mut vars = HashMap::new();
        vars.insert(
            "question_count".to_string(),
            self.settings.quiz_questions.to_string(),
        );
        vars.insert("transcript".to_string(), transcript.text.clone());

        let system = self
            .prompts
            .render_with_custom(&self.prompts.study_guide.system, &vars);
        let user = self
            .prompts
            .render_with_custom(&self.prompts.study_guide.user, &vars);

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.settings.model)
            .messages(vec![Self::system_message(&system)?, Self::user_message(user)?])
            .response_format(ResponseFormat::JsonObject)
            .build()
            .map_err(tutor_error)?;

        let raw = self.complete(request).await?;
        debug!("Study guide response: {} bytes", raw.len());

        let guide = StudyGuide::from_json(&raw)?;
        info!(
            "Generated summary and {} quiz questions",
            guide.quiz_questions.len()
        );
        Ok(guide)
    }

    #[instrument(skip(self, request, chunks), fields(chunks = chunks.len()))]
    async fn answer(&self, request: &AskRequest, chunks: &[String]) -> Result<String> {
        let image_url = request.screenshot_url()?;
        let context = format_context(&request.summary, &request.messages, chunks);

        let mut vars = HashMap::new();
        vars.insert("question".to_string(), request.question.clone());
        vars.insert("context".to_string(), context);
        let text = self
            .prompts
            .render_with_custom(&self.prompts.answer.user, &vars);

        let parts: Vec<ChatCompletionRequestUserMessageContentPart> = vec![
            ChatCompletionRequestMessageContentPartTextArgs::default()
                .text(text)
                .build()
                .map_err(tutor_error)?
                .into(),
            ChatCompletionRequestMessageContentPartImageArgs::default()
                .image_url(
                    ImageUrlArgs::default()
                        .url(image_url)
                        .detail(ImageDetail::Auto)
                        .build()
                        .map_err(tutor_error)?,
                )
                .build()
                .map_err(tutor_error)?
                .into(),
        ];

        let user: ChatCompletionRequestMessage = ChatCompletionRequestUserMessageArgs::default()
            .content(ChatCompletionRequestUserMessageContent::Array(parts))
            .build()
            .map_err(tutor_error)?
            .into();

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.settings.vision_model)
            .messages(vec![Self::system_message(&self.prompts.answer.system)?, user])
            .temperature(self.settings.temperature)
            .build()
            .map_err(tutor_error)?;

        self.complete(request).await
    }

    #[instrument(skip_all)]
    async fn evaluate(&self, question: &str, answer: &str, context: &str) -> Result<String> {
        let mut vars = HashMap::new();
        vars.insert("question".to_string(), question.to_string());
        vars.insert("answer".to_string(), answer.to_string());
        vars.insert("context".to_string(), context.to_string());

        let user = self
            .prompts
            .render_with_custom(&self.prompts.evaluation.user, &vars);

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.settings.model)
            .messages(vec![
                Self::system_message(&self.prompts.evaluation.system)?,
                Self::user_message(user)?,
            ])
            .build()
            .map_err(tutor_error)?;

        self.complete(request).await
    }
}
