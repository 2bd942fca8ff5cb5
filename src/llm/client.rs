//! HTTP generation client with retry, per-attempt timeout and cancellation.

use std::time::Duration;

use futures::future::BoxFuture;
use reqwest::Client;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::error::LlmError;
use super::ollama::{GenerateRequest, GenerateResponse};
use super::openai::{ChatRequest, ChatResponse};
use super::provider::Protocol;
use crate::config::LlmConfig;

/// A single text generation request.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    /// Model name.
    pub model: String,
    /// User prompt.
    pub prompt: String,
    /// Optional system prompt.
    pub system_prompt: Option<String>,
    /// Sampling temperature; the client default applies when unset or zero.
    pub temperature: Option<f32>,
}

impl GenerationRequest {
    /// Creates a request without system prompt or temperature override.
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            system_prompt: None,
            temperature: None,
        }
    }

    /// Sets the system prompt.
    #[must_use]
    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }
}

/// Anything that turns a [`GenerationRequest`] into text.
///
/// Implementations must return [`LlmError::Cancelled`] promptly once
/// `cancel` fires.
pub trait TextGenerator: Send + Sync {
    /// Generates text for `request`.
    fn generate<'a>(
        &'a self,
        request: &'a GenerationRequest,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<String, LlmError>>;
}

/// Text generator backed by an HTTP provider.
///
/// Holds no per-call state; one instance serves many concurrent tasks.
#[derive(Debug, Clone)]
pub struct GenerationClient {
    http: Client,
    protocol: Protocol,
    url: String,
    request_timeout: Duration,
    max_retries: u32,
    default_temperature: f32,
}

impl GenerationClient {
    /// Creates a client for `protocol` at `host`.
    pub fn new(
        protocol: Protocol,
        host: &str,
        api_path: Option<&str>,
        request_timeout: Duration,
        max_retries: u32,
        default_temperature: f32,
    ) -> Self {
        let url = protocol.endpoint_url(host, api_path);
        debug!(provider = %protocol.name(), url = %url, "Constructed generation endpoint");

        Self {
            http: Client::new(),
            protocol,
            url,
            request_timeout,
            max_retries,
            default_temperature,
        }
    }

    /// Creates a client from resolved configuration.
    pub fn from_config(config: &LlmConfig) -> Self {
        Self::new(
            config.protocol.clone(),
            &config.host,
            config.api_path.as_deref(),
            config.request_timeout,
            config.max_retries,
            config.temperature,
        )
    }

    async fn generate_with_retry(
        &self,
        request: &GenerationRequest,
        cancel: &CancellationToken,
    ) -> Result<String, LlmError> {
        let max_attempts = self.max_retries.saturating_add(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            if cancel.is_cancelled() {
                return Err(LlmError::Cancelled);
            }

            debug!(attempt, max_attempts, model = %request.model, "Sending generation request");

            let result = tokio::select! {
                biased;
                () = cancel.cancelled() => Err(LlmError::Cancelled),
                outcome = tokio::time::timeout(self.request_timeout, self.send_once(request)) => {
                    outcome.unwrap_or_else(|_| Err(LlmError::Timeout(self.request_timeout)))
                }
            };

            match result {
                Ok(text) => {
                    debug!(attempt, response_len = text.len(), "Generation succeeded");
                    return Ok(text);
                }
                Err(LlmError::Cancelled) => {
                    debug!(attempt, "Generation cancelled");
                    return Err(LlmError::Cancelled);
                }
                Err(err) if attempt >= max_attempts => {
                    warn!(attempts = attempt, error = %err, "Generation failed, giving up");
                    return Err(LlmError::Exhausted {
                        attempts: attempt,
                        last: Box::new(err),
                    });
                }
                Err(err) => {
                    warn!(attempt, max_attempts, error = %err, "Generation attempt failed, retrying");
                }
            }
        }
    }

    async fn send_once(&self, request: &GenerationRequest) -> Result<String, LlmError> {
        let temperature = request
            .temperature
            .filter(|t| *t > 0.0)
            .unwrap_or(self.default_temperature);
        let system = request.system_prompt.as_deref();

        info!(url = %self.url, model = %request.model, "Sending request to {}", self.protocol.name());

        let builder = match &self.protocol {
            Protocol::Local => self.http.post(&self.url).json(&GenerateRequest::new(
                &request.model,
                &request.prompt,
                system,
                Some(temperature),
            )),
            Protocol::Chat { api_key, .. } => {
                self.http
                    .post(&self.url)
                    .bearer_auth(api_key)
                    .json(&ChatRequest::new(
                        &request.model,
                        &request.prompt,
                        system,
                        Some(temperature),
                    ))
            }
        };

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status { status, body });
        }

        match &self.protocol {
            Protocol::Local => response.json::<GenerateResponse>().await?.into_text(),
            Protocol::Chat { .. } => response.json::<ChatResponse>().await?.into_text(),
        }
    }
}

impl TextGenerator for GenerationClient {
    fn generate<'a>(
        &'a self,
        request: &'a GenerationRequest,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<String, LlmError>> {
        Box::pin(self.generate_with_retry(request, cancel))
    }
}
