//! Judge client trait, provider selection and structured-output decoding.

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::config::LlmConfig;
use crate::types::{AppError, Result};

/// Requested output shape for a judge call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    /// The response must parse into the caller's expected JSON fields;
    /// anything else is a malformed-response error.
    Json,
    /// Free text (report synthesis).
    Text,
}

/// Opaque LLM capability: prompt in, text out.
///
/// All judge providers implement this trait, allowing the orchestrator to
/// swap providers without changing pipeline code.
#[async_trait]
pub trait JudgeClient: Send + Sync {
    async fn complete(&self, prompt: &str, format: ResponseFormat) -> Result<String>;

    /// Model identifier, for logs.
    fn model_name(&self) -> &str;
}

/// Provider enum for runtime selection.
#[derive(Debug, Clone)]
pub enum JudgeProvider {
    /// OpenAI API or any compatible endpoint.
    OpenAI {
        api_key: String,
        api_base: String,
        model: String,
    },
    /// Google Generative Language API.
    Gemini { api_key: String, model: String },
}

impl JudgeProvider {
    /// Build the provider for one model tier out of the LLM config section.
    pub fn from_config(config: &LlmConfig, model: &str) -> Result<Self> {
        match config.provider.as_str() {
            "openai" => Ok(JudgeProvider::OpenAI {
                api_key: config.api_key()?,
                api_base: config.api_base.clone(),
                model: model.to_string(),
            }),
            "gemini" => Ok(JudgeProvider::Gemini {
                api_key: config.api_key()?,
                model: model.to_string(),
            }),
            other => Err(AppError::Config(format!("unknown judge provider: {other}"))),
        }
    }

    /// Create a client instance for this provider.
    pub fn create_client(&self) -> Box<dyn JudgeClient> {
        match self {
            JudgeProvider::OpenAI {
                api_key,
                api_base,
                model,
            } => Box::new(super::openai::OpenAIJudge::new(
                api_key.clone(),
                api_base.clone(),
                model.clone(),
            )),
            JudgeProvider::Gemini { api_key, model } => {
                Box::new(super::gemini::GeminiJudge::new(api_key.clone(), model.clone()))
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            JudgeProvider::OpenAI { .. } => "OpenAI",
            JudgeProvider::Gemini { .. } => "Gemini",
        }
    }
}

/// Decode a structured judge response into the exact expected fields.
///
/// Models occasionally wrap JSON in a markdown fence despite instructions;
/// the fence is stripped before decoding. Any decode failure is a
/// malformed-response error, distinct from provider errors.
pub fn parse_structured<T: DeserializeOwned>(raw: &str) -> Result<T> {
    let cleaned = strip_code_fence(raw);
    serde_json::from_str(cleaned)
        .map_err(|e| AppError::MalformedResponse(format!("unexpected judge output shape: {e}")))
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let without_open = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    without_open
        .trim_start()
        .strip_suffix("```")
        .unwrap_or(without_open)
        .trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Queries {
        new_queries: Vec<String>,
    }

    #[test]
    fn parses_bare_json() {
        let parsed: Queries = parse_structured(r#"{"new_queries": ["a", "b"]}"#).unwrap();
        assert_eq!(parsed.new_queries, vec!["a", "b"]);
    }

    #[test]
    fn strips_markdown_fences() {
        let raw = "```json\n{\"new_queries\": []}\n```";
        let parsed: Queries = parse_structured(raw).unwrap();
        assert!(parsed.new_queries.is_empty());
    }

    #[test]
    fn malformed_output_is_its_own_error_class() {
        let result: Result<Queries> = parse_structured("I could not comply.");
        assert!(matches!(result, Err(AppError::MalformedResponse(_))));
    }

    #[test]
    fn unknown_provider_is_a_config_error() {
        let config = LlmConfig {
            provider: "palm".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            JudgeProvider::from_config(&config, "m"),
            Err(AppError::Config(_))
        ));
    }
}
