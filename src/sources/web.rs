//! Web search client with selectable backends.
//!
//! Backends:
//! - **Tavily**: hosted search API, keyed
//! - **DuckDuckGo**: keyless, via the `daedra` crate
//! - **Disabled**: always returns nothing, so the rest of the pipeline runs
//!   unchanged when no web backend is wanted

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::config::WebSearchConfig;
use crate::sources::SourceClient;
use crate::types::{AppError, Result, WebResult};

const TAVILY_API_BASE: &str = "https://api.tavily.com";

pub struct WebSearchClient {
    backend: Backend,
}

enum Backend {
    Tavily {
        http: reqwest::Client,
        api_base: String,
        api_key: String,
    },
    DuckDuckGo,
    Disabled,
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
}

impl WebSearchClient {
    pub fn from_config(config: &WebSearchConfig) -> Result<Self> {
        let backend = match config.provider.as_str() {
            "tavily" => Backend::Tavily {
                http: reqwest::Client::new(),
                api_base: TAVILY_API_BASE.to_string(),
                api_key: config.tavily_api_key()?,
            },
            "duckduckgo" => Backend::DuckDuckGo,
            "none" => Backend::Disabled,
            other => {
                return Err(AppError::Config(format!(
                    "unknown web search provider: {other}"
                )))
            }
        };
        Ok(Self { backend })
    }

    /// Tavily client against an arbitrary endpoint, used by tests.
    pub fn tavily_with_api_base(api_base: String, api_key: String) -> Self {
        Self {
            backend: Backend::Tavily {
                http: reqwest::Client::new(),
                api_base,
                api_key,
            },
        }
    }

    pub fn disabled() -> Self {
        Self {
            backend: Backend::Disabled,
        }
    }

    async fn tavily_search(
        http: &reqwest::Client,
        api_base: &str,
        api_key: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<WebResult>> {
        let response = http
            .post(format!("{api_base}/search"))
            .json(&json!({
                "api_key": api_key,
                "query": query,
                "max_results": limit,
            }))
            .send()
            .await
            .map_err(|e| AppError::Source(format!("Tavily request failed: {e}")))?
            .error_for_status()
            .map_err(|e| AppError::Source(format!("Tavily request failed: {e}")))?;

        let parsed: TavilyResponse = response
            .json()
            .await
            .map_err(|e| AppError::Source(format!("Tavily decode failed: {e}")))?;

        Ok(parsed
            .results
            .into_iter()
            .filter(|r| !r.url.is_empty())
            .map(|r| WebResult {
                url: r.url,
                title: r.title,
                snippet: r.content,
            })
            .collect())
    }

    async fn duckduckgo_search(query: &str, limit: usize) -> Result<Vec<WebResult>> {
        let args = daedra::SearchArgs {
            query: query.to_string(),
            options: Some(daedra::SearchOptions {
                num_results: limit,
                ..Default::default()
            }),
        };
        let response = daedra::tools::search::perform_search(&args)
            .await
            .map_err(|e| AppError::Source(format!("DuckDuckGo search failed: {e}")))?;

        Ok(response
            .data
            .iter()
            .map(|r| WebResult {
                url: r.url.clone(),
                title: r.title.clone(),
                snippet: r.description.clone(),
            })
            .collect())
    }
}

#[async_trait]
impl SourceClient for WebSearchClient {
    type Item = WebResult;

    fn label(&self) -> &'static str {
        "web search"
    }

    fn query_grammar(&self) -> &'static str {
        "short natural-language web queries"
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<WebResult>> {
        match &self.backend {
            Backend::Tavily {
                http,
                api_base,
                api_key,
            } => Self::tavily_search(http, api_base, api_key, query, limit).await,
            Backend::DuckDuckGo => Self::duckduckgo_search(query, limit).await,
            Backend::Disabled => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn tavily_results_map_to_web_results() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .and(body_partial_json(json!({ "query": "gut brain axis" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [
                    { "title": "Review", "url": "https://a.org", "content": "snippet" },
                    { "title": "no url", "url": "", "content": "dropped" }
                ]
            })))
            .mount(&server)
            .await;

        let client = WebSearchClient::tavily_with_api_base(server.uri(), "key".to_string());
        let hits = client.search("gut brain axis", 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].url, "https://a.org");
        assert_eq!(hits[0].snippet, "snippet");
    }

    #[tokio::test]
    async fn disabled_backend_returns_nothing() {
        let client = WebSearchClient::disabled();
        let hits = client.search("anything", 10).await.unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn unknown_provider_is_a_config_error() {
        let config = WebSearchConfig {
            provider: "bing".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            WebSearchClient::from_config(&config),
            Err(AppError::Config(_))
        ));
    }
}
