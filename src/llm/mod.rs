//! Text-generation collaborator boundary.
//!
//! The orchestrator only ever sees `complete(prompt) -> text`. The concrete
//! backend is a local Ollama server; tests substitute a scripted client.
//! Provider errors surface as `Err` and every caller recovers locally with
//! its own fallback value.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use crate::config::Config;

/// A blocking-from-the-caller's-perspective text completion service.
#[async_trait]
pub trait Completion: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Client for the Ollama `/api/generate` endpoint (non-streaming).
pub struct OllamaClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl OllamaClient {
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.ollama_base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl Completion for OllamaClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url);

        let body = json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
            "options": {
                "temperature": 0.1
            }
        });

        debug!("Sending completion request ({} chars)", prompt.len());

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        let parsed: serde_json::Value = response.json().await?;

        let text = parsed["response"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("No response text in Ollama reply"))?;

        Ok(text.to_string())
    }
}
