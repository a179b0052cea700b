//! TOML-based configuration (`scrivener.toml`).
//!
//! Secrets are never stored in the file; each credential field names the
//! environment variable that holds it. `.env` files are honored via
//! `dotenvy` before the first lookup.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::types::{AppError, Result};

/// Root configuration structure loaded from `scrivener.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub pubmed: PubmedConfig,
    #[serde(default)]
    pub clinical_trials: ClinicalTrialsConfig,
    #[serde(default)]
    pub web_search: WebSearchConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

impl Config {
    /// Load from a TOML file; a missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("failed to read {}: {e}", path.display())))?;
        toml::from_str(&text)
            .map_err(|e| AppError::Config(format!("invalid config {}: {e}", path.display())))
    }

    /// A commented sample configuration for `scrivener init`.
    pub fn sample_toml() -> &'static str {
        r#"[llm]
# Judge provider: "openai" (any OpenAI-compatible endpoint) or "gemini"
provider = "openai"
api_key_env = "OPENAI_API_KEY"
api_base = "https://api.openai.com/v1"
fast_model = "gpt-4o-mini"
smart_model = "gpt-4o"

[pubmed]
# Optional NCBI key lifts the E-utilities rate limit; without it a delay is
# inserted between sequential supplemental requests.
api_key_env = "NCBI_API_KEY"
page_size = 50
supplemental_page_size = 10

[clinical_trials]
page_size = 20

[web_search]
# "tavily", "duckduckgo" or "none"
provider = "duckduckgo"
tavily_api_key_env = "TAVILY_API_KEY"

[storage]
path = "./data/sessions.json"
"#
    }
}

// ============= LLM Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// "openai" or "gemini".
    #[serde(default = "default_llm_provider")]
    pub provider: String,

    /// Environment variable holding the judge API key.
    #[serde(default = "default_llm_key_env")]
    pub api_key_env: String,

    /// Base URL for OpenAI-compatible endpoints.
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Model used for planning, critique and scoring.
    #[serde(default = "default_fast_model")]
    pub fast_model: String,

    /// Model used for report synthesis.
    #[serde(default = "default_smart_model")]
    pub smart_model: String,
}

fn default_llm_provider() -> String {
    "openai".to_string()
}

fn default_llm_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_fast_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_smart_model() -> String {
    "gpt-4o".to_string()
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            api_key_env: default_llm_key_env(),
            api_base: default_api_base(),
            fast_model: default_fast_model(),
            smart_model: default_smart_model(),
        }
    }
}

impl LlmConfig {
    /// Resolve the judge API key; absence is a configuration error.
    pub fn api_key(&self) -> Result<String> {
        read_env(&self.api_key_env).ok_or_else(|| {
            AppError::Config(format!(
                "judge API key not configured (set {})",
                self.api_key_env
            ))
        })
    }
}

// ============= Source Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PubmedConfig {
    /// Environment variable holding the optional NCBI API key.
    #[serde(default = "default_ncbi_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_pubmed_page_size")]
    pub page_size: usize,

    #[serde(default = "default_pubmed_supplemental_page_size")]
    pub supplemental_page_size: usize,
}

fn default_ncbi_key_env() -> String {
    "NCBI_API_KEY".to_string()
}

fn default_pubmed_page_size() -> usize {
    50
}

fn default_pubmed_supplemental_page_size() -> usize {
    10
}

impl Default for PubmedConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_ncbi_key_env(),
            page_size: default_pubmed_page_size(),
            supplemental_page_size: default_pubmed_supplemental_page_size(),
        }
    }
}

impl PubmedConfig {
    /// The NCBI key is optional; without it supplemental requests are spaced.
    pub fn api_key(&self) -> Option<String> {
        read_env(&self.api_key_env)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClinicalTrialsConfig {
    #[serde(default = "default_trials_page_size")]
    pub page_size: usize,
}

fn default_trials_page_size() -> usize {
    20
}

impl Default for ClinicalTrialsConfig {
    fn default() -> Self {
        Self {
            page_size: default_trials_page_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSearchConfig {
    /// "tavily", "duckduckgo" or "none".
    #[serde(default = "default_web_provider")]
    pub provider: String,

    #[serde(default = "default_tavily_key_env")]
    pub tavily_api_key_env: String,

    #[serde(default = "default_web_page_size")]
    pub page_size: usize,
}

fn default_web_provider() -> String {
    "duckduckgo".to_string()
}

fn default_tavily_key_env() -> String {
    "TAVILY_API_KEY".to_string()
}

fn default_web_page_size() -> usize {
    10
}

impl Default for WebSearchConfig {
    fn default() -> Self {
        Self {
            provider: default_web_provider(),
            tavily_api_key_env: default_tavily_key_env(),
            page_size: default_web_page_size(),
        }
    }
}

impl WebSearchConfig {
    pub fn tavily_api_key(&self) -> Result<String> {
        read_env(&self.tavily_api_key_env).ok_or_else(|| {
            AppError::Config(format!(
                "Tavily API key not configured (set {})",
                self.tavily_api_key_env
            ))
        })
    }
}

// ============= Storage Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_path")]
    pub path: String,
}

fn default_storage_path() -> String {
    "./data/sessions.json".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
        }
    }
}

fn read_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_sections() {
        let config: Config = toml::from_str("[llm]\nprovider = \"gemini\"").unwrap();
        assert_eq!(config.llm.provider, "gemini");
        assert_eq!(config.pubmed.page_size, 50);
        assert_eq!(config.clinical_trials.page_size, 20);
        assert_eq!(config.web_search.provider, "duckduckgo");
    }

    #[test]
    fn sample_config_parses() {
        let config: Config = toml::from_str(Config::sample_toml()).unwrap();
        assert_eq!(config.llm.fast_model, "gpt-4o-mini");
        assert_eq!(config.storage.path, "./data/sessions.json");
    }

    #[test]
    fn missing_judge_key_is_a_config_error() {
        let llm = LlmConfig {
            api_key_env: "SCRIVENER_TEST_UNSET_KEY".to_string(),
            ..Default::default()
        };
        assert!(matches!(llm.api_key(), Err(AppError::Config(_))));
    }
}
