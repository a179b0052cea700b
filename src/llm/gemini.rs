//! Gemini judge implementation over the Generative Language REST API.
//!
//! JSON-shaped calls rely on prompt discipline rather than a response schema;
//! the generic fence-stripping decoder handles the occasional wrapper.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::llm::client::{JudgeClient, ResponseFormat};
use crate::types::{AppError, Result};

const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com";

pub struct GeminiJudge {
    http: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(rename = "promptFeedback")]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct PromptFeedback {
    #[serde(rename = "blockReason")]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: Option<String>,
}

impl GeminiJudge {
    pub fn new(api_key: String, model: String) -> Self {
        Self::with_api_base(DEFAULT_API_BASE.to_string(), api_key, model)
    }

    /// Override the endpoint, used by tests against a local mock server.
    pub fn with_api_base(api_base: String, api_key: String, model: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base,
            api_key,
            model,
        }
    }
}

#[async_trait]
impl JudgeClient for GeminiJudge {
    async fn complete(&self, prompt: &str, _format: ResponseFormat) -> Result<String> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.api_base, self.model, self.api_key
        );
        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        });

        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Judge(format!("Gemini request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let message = response
                .json::<ApiErrorBody>()
                .await
                .ok()
                .and_then(|b| b.error)
                .and_then(|e| e.message)
                .unwrap_or_else(|| status.to_string());
            return Err(AppError::Judge(format!("Gemini API error: {message}")));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| AppError::Judge(format!("Gemini response decode failed: {e}")))?;

        let text = parsed
            .candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .map(|p| p.text.as_str())
                    .collect::<String>()
            })
            .filter(|t| !t.is_empty());

        text.ok_or_else(|| {
            let block = parsed
                .prompt_feedback
                .and_then(|f| f.block_reason)
                .unwrap_or_else(|| "unknown".to_string());
            AppError::Judge(format!("Gemini returned no content (block reason: {block})"))
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn returns_candidate_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path_regex(r"/v1beta/models/.*:generateContent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{ "content": { "parts": [{ "text": "hello" }] } }]
            })))
            .mount(&server)
            .await;

        let judge =
            GeminiJudge::with_api_base(server.uri(), "key".to_string(), "gemini-2.0".to_string());
        let out = judge.complete("hi", ResponseFormat::Text).await.unwrap();
        assert_eq!(out, "hello");
    }

    #[tokio::test]
    async fn blocked_prompt_surfaces_block_reason() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path_regex(r"/v1beta/models/.*:generateContent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [],
                "promptFeedback": { "blockReason": "SAFETY" }
            })))
            .mount(&server)
            .await;

        let judge =
            GeminiJudge::with_api_base(server.uri(), "key".to_string(), "gemini-2.0".to_string());
        let err = judge
            .complete("hi", ResponseFormat::Json)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("SAFETY"));
    }

    #[tokio::test]
    async fn provider_error_carries_api_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path_regex(r"/v1beta/models/.*:generateContent"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": { "message": "API key not valid" }
            })))
            .mount(&server)
            .await;

        let judge =
            GeminiJudge::with_api_base(server.uri(), "bad".to_string(), "gemini-2.0".to_string());
        let err = judge
            .complete("hi", ResponseFormat::Json)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Judge(_)));
        assert!(err.to_string().contains("API key not valid"));
    }
}
