//! Chat-completion clients.
//!
//! [`ChatModel`] is the seam between the analyzer and whichever LLM backs
//! it. Two HTTP implementations ship:
//!
//! - [`OpenAIChat`]: `POST {base_url}/chat/completions` with a bearer
//!   `OPENAI_API_KEY`, reading `choices[0].message.content`.
//! - [`OllamaChat`]: `POST {url}/api/chat` with `stream: false`, reading
//!   `message.content`.
//!
//! Both send a single user message and go through [`crate::http::post_json`]
//! for retries. Every failure is reported as [`AnalyzeError::Llm`] so the
//! HTTP layer can answer 502.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::config::LlmConfig;
use crate::error::AnalyzeError;
use crate::http;

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const OLLAMA_URL: &str = "http://localhost:11434";

/// Sampling limits for one completion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sampling {
    pub max_tokens: u32,
    pub temperature: f64,
}

#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Model identifier, used as part of the summary cache key.
    fn model_name(&self) -> &str;

    /// Send `prompt` as a single user message and return the reply text, trimmed.
    async fn complete(&self, prompt: &str, sampling: Sampling) -> Result<String>;
}

/// Build the chat model for `config`, or `None` when the LLM is disabled.
pub fn create_chat_model(config: &LlmConfig) -> Result<Option<Arc<dyn ChatModel>>> {
    if !config.is_enabled() {
        return Ok(None);
    }

    match config.provider.as_str() {
        "openai" => Ok(Some(Arc::new(OpenAIChat::new(config)?))),
        "ollama" => Ok(Some(Arc::new(OllamaChat::new(config)?))),
        other => Err(anyhow!("Unknown llm provider: {}", other)),
    }
}

fn llm_error(e: anyhow::Error) -> anyhow::Error {
    AnalyzeError::Llm(format!("{:#}", e)).into()
}

// ============ OpenAI ============

pub struct OpenAIChat {
    model: String,
    base_url: String,
    api_key: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl OpenAIChat {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow!("OPENAI_API_KEY environment variable not set"))?;
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| OPENAI_BASE_URL.to_string());

        Ok(Self {
            model: config.model_name().to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            max_retries: config.max_retries,
            client: http::client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl ChatModel for OpenAIChat {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str, sampling: Sampling) -> Result<String> {
        let body = json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
            "max_tokens": sampling.max_tokens,
            "temperature": sampling.temperature,
        });
        let url = format!("{}/chat/completions", self.base_url);

        let json = http::post_json(
            &self.client,
            &url,
            Some(&self.api_key),
            &body,
            self.max_retries,
            "OpenAI",
        )
        .await
        .map_err(llm_error)?;

        parse_openai_reply(&json).map_err(llm_error)
    }
}

fn parse_openai_reply(json: &Value) -> Result<String> {
    json.pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .map(|c| c.trim().to_string())
        .ok_or_else(|| anyhow!("Invalid OpenAI response: missing choices[0].message.content"))
}

// ============ Ollama ============

pub struct OllamaChat {
    model: String,
    url: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl OllamaChat {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let url = config.url.clone().unwrap_or_else(|| OLLAMA_URL.to_string());
        Ok(Self {
            model: config.model_name().to_string(),
            url: url.trim_end_matches('/').to_string(),
            max_retries: config.max_retries,
            client: http::client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl ChatModel for OllamaChat {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str, sampling: Sampling) -> Result<String> {
        let body = json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
            "stream": false,
            "options": {
                "num_predict": sampling.max_tokens,
                "temperature": sampling.temperature,
            },
        });
        let url = format!("{}/api/chat", self.url);

        let json = http::post_json(&self.client, &url, None, &body, self.max_retries, "Ollama")
            .await
            .map_err(llm_error)?;

        json.pointer("/message/content")
            .and_then(|c| c.as_str())
            .map(|c| c.trim().to_string())
            .ok_or_else(|| llm_error(anyhow!("Invalid Ollama response: missing message.content")))
    }
}
