//! Text-generation collaborator abstraction
//!
//! Supports:
//! - Ollama (local models, /api/chat)
//! - OpenAI-compatible chat endpoints (OpenAI, Groq)
//! - Anthropic (messages API)
//!
//! A generator returns the provider's raw message envelope as untyped JSON.
//! Shape normalization is owned by [`crate::recovery::adapter`], so every
//! downstream stage is isolated from per-provider response shapes.

use crate::config::{ModelConfig, ModelProvider};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;

/// Provider errors
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Authentication error: {0}")]
    AuthError(String),

    #[error("Model error: {0}")]
    ModelError(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// A role-tagged message in a generation request
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Per-call generation options
#[derive(Debug, Clone, Default)]
pub struct GenerationOptions {
    pub temperature: Option<f32>,
    pub max_tokens: Option<usize>,
}

/// Text-generation collaborator
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Invoke the model with role-tagged messages, returning the raw
    /// response envelope exactly as the provider produced it.
    async fn invoke(
        &self,
        messages: &[ChatMessage],
        options: &GenerationOptions,
    ) -> Result<Value, ProviderError>;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// HTTP-backed generator for all supported providers
pub struct HttpTextGenerator {
    config: ModelConfig,
    client: Client,
    api_key: Option<String>,
}

impl HttpTextGenerator {
    pub fn new(config: ModelConfig) -> Result<Self, ProviderError> {
        let api_key = config.resolve_api_key();

        if config.provider != ModelProvider::Ollama && api_key.is_none() {
            return Err(ProviderError::AuthError(format!(
                "{} API key not found",
                config.provider
            )));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .unwrap_or_default();

        Ok(Self {
            config,
            client,
            api_key,
        })
    }

    /// Validate connection to the provider
    pub async fn validate_connection(&self) -> Result<(), ProviderError> {
        let url = match self.config.provider {
            ModelProvider::Ollama => format!("{}/api/tags", self.config.url),
            _ => format!("{}/models", self.config.url),
        };

        let mut request = self.client.get(&url);
        if let Some(ref key) = self.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let response = request
            .send()
            .await
            .map_err(|e| ProviderError::ConnectionError(e.to_string()))?;

        if response.status() == 401 {
            return Err(ProviderError::AuthError("Invalid API key".to_string()));
        }

        if !response.status().is_success() {
            return Err(ProviderError::ConnectionError(format!(
                "Failed to connect to {} at {}: HTTP {}",
                self.config.provider,
                self.config.url,
                response.status()
            )));
        }

        Ok(())
    }

    async fn invoke_ollama(
        &self,
        messages: &[ChatMessage],
        options: &GenerationOptions,
    ) -> Result<Value, ProviderError> {
        let url = format!("{}/api/chat", self.config.url);

        let request = json!({
            "model": self.config.model,
            "messages": messages,
            "stream": false,
            "options": {
                "temperature": options.temperature.unwrap_or(self.config.temperature),
                "num_predict": options.max_tokens.or(self.config.max_tokens),
            },
        });

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::ConnectionError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ProviderError::ModelError(format!(
                "HTTP {}: {}",
                response.status(),
                response.text().await?
            )));
        }

        let body: Value = response.json().await?;
        body.get("message")
            .cloned()
            .ok_or_else(|| ProviderError::InvalidResponse("No message in response".to_string()))
    }

    async fn invoke_openai_compatible(
        &self,
        messages: &[ChatMessage],
        options: &GenerationOptions,
    ) -> Result<Value, ProviderError> {
        let url = format!("{}/chat/completions", self.config.url);

        let request = json!({
            "model": self.config.model,
            "messages": messages,
            "temperature": options.temperature.unwrap_or(self.config.temperature),
            "max_tokens": options.max_tokens.or(self.config.max_tokens),
        });

        let key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ProviderError::AuthError("API key not found".to_string()))?;

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::ConnectionError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ProviderError::ModelError(format!(
                "HTTP {}: {}",
                response.status(),
                response.text().await?
            )));
        }

        let body: Value = response.json().await?;
        body.get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .cloned()
            .ok_or_else(|| ProviderError::InvalidResponse("No choices in response".to_string()))
    }

    async fn invoke_anthropic(
        &self,
        messages: &[ChatMessage],
        options: &GenerationOptions,
    ) -> Result<Value, ProviderError> {
        let url = format!("{}/messages", self.config.url);

        // Anthropic takes the system prompt as a top-level field
        let (system, rest): (Vec<_>, Vec<_>) =
            messages.iter().partition(|m| m.role == "system");

        let request = json!({
            "model": self.config.model,
            "system": system.first().map(|m| m.content.clone()).unwrap_or_default(),
            "messages": rest,
            "max_tokens": options.max_tokens.or(self.config.max_tokens).unwrap_or(4096),
            "temperature": options.temperature.unwrap_or(self.config.temperature),
        });

        let key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ProviderError::AuthError("API key not found".to_string()))?;

        let response = self
            .client
            .post(&url)
            .header("x-api-key", key)
            .header("anthropic-version", "2023-06-01")
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::ConnectionError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ProviderError::ModelError(format!(
                "HTTP {}: {}",
                response.status(),
                response.text().await?
            )));
        }

        let body: Value = response.json().await?;
        body.get("content")
            .and_then(|c| c.get(0))
            .cloned()
            .ok_or_else(|| ProviderError::InvalidResponse("No content in response".to_string()))
    }
}

#[async_trait]
impl TextGenerator for HttpTextGenerator {
    async fn invoke(
        &self,
        messages: &[ChatMessage],
        options: &GenerationOptions,
    ) -> Result<Value, ProviderError> {
        match self.config.provider {
            ModelProvider::Ollama => self.invoke_ollama(messages, options).await,
            ModelProvider::OpenAI | ModelProvider::Groq => {
                self.invoke_openai_compatible(messages, options).await
            }
            ModelProvider::Anthropic => self.invoke_anthropic(messages, options).await,
        }
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}
