//! Configuration for the translation pipeline.
//!
//! Loadable from TOML or assembled from environment variables; every knob
//! has a default so tests can start from `TranslatorConfig::default()` and
//! override only what they exercise.

use serde::{Deserialize, Serialize};

use crate::llm::LlmProviderType;

/// Top-level configuration for a [`crate::pipeline::Translator`].
///
/// Fields missing from a TOML document fall back to their defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslatorConfig {
    /// Base URL of the scholarly-graph API (schema catalog + entity search).
    pub api_base_url: String,
    /// Upper bound on prompt length; longer prompts are rejected outright.
    pub max_prompt_len: usize,
    /// Attempt bound for the composer's retry-with-feedback loop.
    pub max_compose_attempts: u32,
    /// Capacity of the prompt-keyed result cache. Zero disables memoization.
    pub cache_capacity: usize,
    /// Language collaborator settings.
    pub llm: LlmConfig,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.openalex.org".to_string(),
            max_prompt_len: 1000,
            max_compose_attempts: 3,
            cache_capacity: 64,
            llm: LlmConfig::default(),
        }
    }
}

impl TranslatorConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Build a configuration from environment variables, falling back to
    /// defaults for anything unset. Recognized variables: `OQL_API_BASE_URL`,
    /// `OQL_MAX_COMPOSE_ATTEMPTS`, `OPENAI_API_KEY`, `OPENAI_MODEL`,
    /// `OPENAI_BASE_URL`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = std::env::var("OQL_API_BASE_URL") {
            config.api_base_url = url;
        }
        if let Ok(n) = std::env::var("OQL_MAX_COMPOSE_ATTEMPTS") {
            if let Ok(n) = n.parse() {
                config.max_compose_attempts = n;
            }
        }
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            config.llm.provider_type = LlmProviderType::OpenAi;
            config.llm.api_key = Some(key);
        }
        if let Ok(model) = std::env::var("OPENAI_MODEL") {
            config.llm.model = model;
        }
        if let Ok(url) = std::env::var("OPENAI_BASE_URL") {
            config.llm.base_url = Some(url);
        }
        config
    }
}

/// Language collaborator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider type (openai-compatible or the deterministic stub).
    pub provider_type: LlmProviderType,
    /// Model identifier.
    pub model: String,
    /// API key; usually loaded from the environment.
    pub api_key: Option<String>,
    /// Override for the chat-completions endpoint base URL.
    pub base_url: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
    pub timeout_seconds: Option<u64>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider_type: LlmProviderType::Stub,
            model: "gpt-4o-2024-08-06".to_string(),
            api_key: None,
            base_url: None,
            max_tokens: Some(4096),
            temperature: Some(0.0),
            timeout_seconds: Some(60),
        }
    }
}
