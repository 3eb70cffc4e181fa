//! Chat completion providers with sequential failover
//!
//! Provides a `ChatBackend` trait with implementations for:
//! - **OpenAI-compatible** - any `/chat/completions` endpoint (OpenAI, Groq, OpenRouter, ...)
//! - **Failover** - an ordered list of backends tried top to bottom on every call

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;

use crate::config::{LlmConfig, ProviderConfig};
use crate::models::ConversationTurn;

/// Credentials shorter than this are treated as unset.
pub const MIN_API_KEY_LEN: usize = 10;

// ============================================================================
// ChatBackend trait
// ============================================================================

/// Abstraction over hosted chat-completion providers.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Run one completion and return the assistant text.
    async fn complete(
        &self,
        messages: &[ConversationTurn],
        temperature: f64,
    ) -> Result<String, LlmError>;

    /// Whether this backend has a usable credential and may be attempted.
    fn is_configured(&self) -> bool;

    /// Backend name for logging.
    fn name(&self) -> &str;
}

// ============================================================================
// Error types
// ============================================================================

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Completion response contained no text")]
    EmptyCompletion,

    #[error("Missing API key")]
    MissingApiKey,

    #[error("All {attempts} retry attempts failed: {last_error}")]
    RetryExhausted { attempts: usize, last_error: String },

    #[error("No provider has a usable credential")]
    NoProviderConfigured,

    #[error("All {attempted} configured providers failed; last error: {last_error}")]
    AllProvidersFailed { attempted: usize, last_error: String },
}

impl LlmError {
    /// Transport failures, rate limits and server errors are worth retrying.
    fn is_transient(&self) -> bool {
        match self {
            LlmError::Http(_) => true,
            LlmError::Api { code, .. } => *code == 429 || *code >= 500,
            _ => false,
        }
    }
}

// ============================================================================
// Config types
// ============================================================================

#[derive(Debug, Clone)]
pub struct ChatClientConfig {
    pub name: String,
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub max_retries: usize,
    pub retry_delay_ms: u64,
    pub request_timeout: Duration,
}

impl ChatClientConfig {
    pub fn from_provider(provider: &ProviderConfig, llm: &LlmConfig) -> Self {
        Self {
            name: provider.name.clone(),
            api_key: provider.api_key(),
            base_url: provider.base_url.trim_end_matches('/').to_string(),
            model: provider.model.clone(),
            max_retries: llm.max_retries,
            retry_delay_ms: llm.retry_delay_ms,
            request_timeout: Duration::from_secs(llm.request_timeout_secs),
        }
    }
}

/// Build the failover chain from the `[llm]` config: primary first, then fallback.
pub fn create_failover_client(config: &LlmConfig) -> Result<ProviderFailoverClient, LlmError> {
    let mut backends: Vec<Box<dyn ChatBackend>> = vec![Box::new(OpenAiChatClient::new(
        ChatClientConfig::from_provider(&config.primary, config),
    )?)];

    if let Some(fallback) = &config.fallback {
        backends.push(Box::new(OpenAiChatClient::new(
            ChatClientConfig::from_provider(fallback, config),
        )?));
    }

    Ok(ProviderFailoverClient::new(backends))
}

// ============================================================================
// OpenAI-compatible API structs (private)
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ConversationTurn],
    temperature: f64,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: Option<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

// ============================================================================
// OpenAiChatClient
// ============================================================================

/// Client for an OpenAI-compatible `/chat/completions` endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiChatClient {
    client: Client,
    config: ChatClientConfig,
}

impl OpenAiChatClient {
    pub fn new(config: ChatClientConfig) -> Result<Self, LlmError> {
        let client = Client::builder().timeout(config.request_timeout).build()?;

        Ok(Self { client, config })
    }

    async fn complete_once(
        &self,
        messages: &[ConversationTurn],
        temperature: f64,
    ) -> Result<String, LlmError> {
        let url = format!("{}/chat/completions", self.config.base_url);

        let request = ChatRequest {
            model: &self.config.model,
            messages,
            temperature,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorResponse>(&error_body)
                .ok()
                .and_then(|e| e.error)
                .map(|e| e.message)
                .unwrap_or(error_body);

            tracing::error!(
                provider = %self.config.name,
                code = status.as_u16(),
                message = %message,
                "Chat completion API error"
            );

            return Err(LlmError::Api {
                code: status.as_u16(),
                message,
            });
        }

        let body: ChatResponse = response.json().await?;

        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or(LlmError::EmptyCompletion)
    }
}

#[async_trait]
impl ChatBackend for OpenAiChatClient {
    async fn complete(
        &self,
        messages: &[ConversationTurn],
        temperature: f64,
    ) -> Result<String, LlmError> {
        if !self.is_configured() {
            return Err(LlmError::MissingApiKey);
        }

        let retry_strategy = ExponentialBackoff::from_millis(self.config.retry_delay_ms)
            .max_delay(Duration::from_secs(10))
            .map(jitter)
            .take(self.config.max_retries);

        let result = RetryIf::spawn(
            retry_strategy,
            || self.complete_once(messages, temperature),
            LlmError::is_transient,
        )
        .await;

        match result {
            Ok(text) => Ok(text),
            Err(e) if e.is_transient() => {
                let attempts = self.config.max_retries + 1;
                tracing::error!(
                    provider = %self.config.name,
                    attempts,
                    error = %e,
                    "All chat completion retry attempts failed"
                );
                Err(LlmError::RetryExhausted {
                    attempts,
                    last_error: e.to_string(),
                })
            }
            Err(e) => Err(e),
        }
    }

    fn is_configured(&self) -> bool {
        self.config.api_key.trim().len() >= MIN_API_KEY_LEN
    }

    fn name(&self) -> &str {
        &self.config.name
    }
}

// ============================================================================
// ProviderFailoverClient
// ============================================================================

/// Tries each configured backend in order and returns the first success.
///
/// Every call starts again from the first backend; there is no health
/// tracking between calls.
pub struct ProviderFailoverClient {
    backends: Vec<Box<dyn ChatBackend>>,
}

impl ProviderFailoverClient {
    pub fn new(backends: Vec<Box<dyn ChatBackend>>) -> Self {
        Self { backends }
    }

    pub fn backend_names(&self) -> Vec<&str> {
        self.backends.iter().map(|b| b.name()).collect()
    }
}

#[async_trait]
impl ChatBackend for ProviderFailoverClient {
    async fn complete(
        &self,
        messages: &[ConversationTurn],
        temperature: f64,
    ) -> Result<String, LlmError> {
        let mut attempted = 0;
        let mut last_error = None;

        for backend in &self.backends {
            if !backend.is_configured() {
                tracing::debug!(backend = backend.name(), "Skipping provider without credential");
                continue;
            }

            attempted += 1;
            match backend.complete(messages, temperature).await {
                Ok(text) => {
                    if attempted > 1 {
                        tracing::info!(backend = backend.name(), "Completion served by fallback provider");
                    }
                    return Ok(text);
                }
                Err(e) => {
                    tracing::warn!(
                        backend = backend.name(),
                        error = %e,
                        "Provider failed, trying next"
                    );
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) => Err(LlmError::AllProvidersFailed {
                attempted,
                last_error: e.to_string(),
            }),
            None => Err(LlmError::NoProviderConfigured),
        }
    }

    fn is_configured(&self) -> bool {
        self.backends.iter().any(|b| b.is_configured())
    }

    fn name(&self) -> &str {
        "failover"
    }
}

// ============================================================================
// TESTS
// ============================================================================
