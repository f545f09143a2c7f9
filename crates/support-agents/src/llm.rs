//! OpenAI-compatible chat-completions client.
//!
//! Every LLM-backed agent talks to the model through the [`ChatModel`] trait,
//! so tests can substitute a mock and deployments can point at any endpoint
//! that speaks `/chat/completions` (OpenRouter, vLLM, llama.cpp server).

use std::time::Duration;

use async_trait::async_trait;
use resolution::CollaboratorError;
use thiserror::Error;
use tracing::debug;

use crate::config::LlmEndpoint;

/// Errors from a chat-completions call.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("API key not configured for {0}")]
    MissingApiKey(String),

    #[error("failed to build HTTP client: {0}")]
    Client(String),

    #[error("API request failed: {0}")]
    RequestFailed(String),

    #[error("API error ({status}): {body}")]
    Status { status: u16, body: String },

    #[error("response parse error: {0}")]
    ParseError(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),
}

impl From<LlmError> for CollaboratorError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::Timeout(after) => CollaboratorError::Timeout(after),
            LlmError::MissingApiKey(_) | LlmError::Client(_) => {
                CollaboratorError::Unavailable(err.to_string())
            }
            LlmError::ParseError(_) => CollaboratorError::InvalidOutput(err.to_string()),
            LlmError::RequestFailed(_) | LlmError::Status { .. } => {
                CollaboratorError::Request(err.to_string())
            }
        }
    }
}

/// One single-turn completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub system: Option<String>,
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl ChatRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            system: None,
            prompt: prompt.into(),
            temperature: 0.1,
            max_tokens: 500,
        }
    }

    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    fn to_body(&self, model: &str) -> serde_json::Value {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &self.system {
            messages.push(serde_json::json!({"role": "system", "content": system}));
        }
        messages.push(serde_json::json!({"role": "user", "content": self.prompt}));
        serde_json::json!({
            "model": model,
            "messages": messages,
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        })
    }
}

/// A model that turns a prompt into text.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, request: ChatRequest) -> Result<String, LlmError>;
}

/// `ChatModel` over HTTP.
pub struct OpenAiCompatClient {
    base_url: String,
    api_key: String,
    model: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl OpenAiCompatClient {
    pub fn new(endpoint: &LlmEndpoint) -> Result<Self, LlmError> {
        let api_key = endpoint
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| LlmError::MissingApiKey(endpoint.url.clone()))?;
        let timeout = Duration::from_secs(endpoint.timeout_secs);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::Client(e.to_string()))?;

        Ok(Self {
            base_url: endpoint.url.trim_end_matches('/').to_string(),
            api_key,
            model: endpoint.model.clone(),
            timeout,
            client,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl ChatModel for OpenAiCompatClient {
    async fn complete(&self, request: ChatRequest) -> Result<String, LlmError> {
        let start = std::time::Instant::now();
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request.to_body(&self.model))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout(self.timeout)
                } else {
                    LlmError::RequestFailed(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status { status, body });
        }

        let resp_json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| LlmError::ParseError(e.to_string()))?;

        let content = resp_json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| LlmError::ParseError("missing choices[0].message.content".into()))?
            .trim()
            .to_string();

        debug!(
            model = %self.model,
            chars = content.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Chat completion received"
        );
        Ok(content)
    }
}

/// Check if an inference endpoint is reachable (GET `/models`).
pub async fn check_endpoint(url: &str) -> bool {
    let models_url = format!("{}/models", url.trim_end_matches('/'));
    match reqwest::Client::new()
        .get(&models_url)
        .timeout(Duration::from_secs(5))
        .send()
        .await
    {
        Ok(resp) => resp.status().is_success(),
        Err(_) => false,
    }
}
