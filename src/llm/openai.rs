//! Wire format of OpenAI-compatible chat completions.

use serde::{Deserialize, Serialize};

use super::error::LlmError;

/// Completion length requested from chat providers.
pub const MAX_TOKENS: u32 = 1024;

#[derive(Serialize, Debug)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

/// Chat completion request body.
#[derive(Serialize, Debug)]
pub(crate) struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    max_tokens: u32,
}

impl<'a> ChatRequest<'a> {
    /// Builds a request with an optional leading system message.
    pub(crate) fn new(
        model: &'a str,
        prompt: &'a str,
        system: Option<&'a str>,
        temperature: Option<f32>,
    ) -> Self {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system.filter(|s| !s.is_empty()) {
            messages.push(Message {
                role: "system",
                content: system,
            });
        }
        messages.push(Message {
            role: "user",
            content: prompt,
        });

        Self {
            model,
            messages,
            temperature: temperature.filter(|t| *t > 0.0),
            max_tokens: MAX_TOKENS,
        }
    }
}

#[derive(Deserialize, Debug)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize, Debug)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ApiError {
    message: String,
}

/// Chat completion response body.
#[derive(Deserialize, Debug)]
pub(crate) struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    error: Option<ApiError>,
}

impl ChatResponse {
    /// Returns the trimmed content of the first choice.
    pub(crate) fn into_text(self) -> Result<String, LlmError> {
        if let Some(error) = self.error {
            return Err(LlmError::Provider(error.message));
        }

        let choice = self
            .choices
            .into_iter()
            .next()
            .ok_or(LlmError::EmptyChoices)?;

        let text = choice.message.content.unwrap_or_default();
        let text = text.trim();
        if text.is_empty() {
            return Err(LlmError::EmptyResponse);
        }
        Ok(text.to_string())
    }
}
