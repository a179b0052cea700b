//! OpenAI-compatible judge implementation.

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestUserMessage,
        CreateChatCompletionRequestArgs, ResponseFormat as OpenAIResponseFormat,
    },
    Client,
};
use async_trait::async_trait;

use crate::llm::client::{JudgeClient, ResponseFormat};
use crate::types::{AppError, Result};

pub struct OpenAIJudge {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAIJudge {
    pub fn new(api_key: String, api_base: String, model: String) -> Self {
        let config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(api_base);

        Self {
            client: Client::with_config(config),
            model,
        }
    }
}

#[async_trait]
impl JudgeClient for OpenAIJudge {
    async fn complete(&self, prompt: &str, format: ResponseFormat) -> Result<String> {
        let mut builder = CreateChatCompletionRequestArgs::default();
        builder
            .model(&self.model)
            .messages(vec![ChatCompletionRequestMessage::User(
                ChatCompletionRequestUserMessage::from(prompt.to_string()),
            )]);
        if format == ResponseFormat::Json {
            builder.response_format(OpenAIResponseFormat::JsonObject);
        }
        let request = builder
            .build()
            .map_err(|e| AppError::Judge(format!("failed to build request: {e}")))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| AppError::Judge(format!("OpenAI API error: {e}")))?;

        response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| AppError::Judge("no response choices from OpenAI".to_string()))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
