//! Wire format of the local generate API.

use serde::{Deserialize, Serialize};

use super::error::LlmError;

/// Generate request body.
#[derive(Serialize, Debug)]
pub(crate) struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<GenerateOptions>,
}

#[derive(Serialize, Debug)]
struct GenerateOptions {
    temperature: f32,
}

impl<'a> GenerateRequest<'a> {
    /// Builds a non-streaming request; `temperature` is omitted unless positive.
    pub(crate) fn new(
        model: &'a str,
        prompt: &'a str,
        system: Option<&'a str>,
        temperature: Option<f32>,
    ) -> Self {
        Self {
            model,
            prompt,
            system: system.filter(|s| !s.is_empty()),
            stream: false,
            options: temperature
                .filter(|t| *t > 0.0)
                .map(|temperature| GenerateOptions { temperature }),
        }
    }
}

/// Generate response body.
#[derive(Deserialize, Debug)]
pub(crate) struct GenerateResponse {
    #[serde(default)]
    response: String,
}

impl GenerateResponse {
    /// Returns the trimmed response text.
    pub(crate) fn into_text(self) -> Result<String, LlmError> {
        let text = self.response.trim();
        if text.is_empty() {
            return Err(LlmError::EmptyResponse);
        }
        Ok(text.to_string())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_omits_optional_fields() {
        let body = serde_json::to_value(GenerateRequest::new("m", "p", None, Some(0.0))).unwrap();
        assert_eq!(body, json!({"model": "m", "prompt": "p", "stream": false}));
    }

    #[test]
    fn request_carries_system_and_temperature() {
        let body =
            serde_json::to_value(GenerateRequest::new("m", "p", Some("sys"), Some(0.5))).unwrap();
        assert_eq!(
            body,
            json!({
                "model": "m",
                "prompt": "p",
                "system": "sys",
                "stream": false,
                "options": {"temperature": 0.5}
            })
        );
    }

    #[test]
    fn response_is_trimmed() {
        let response: GenerateResponse =
            serde_json::from_str(r#"{"response": "  Added a test.\n", "done": true}"#).unwrap();
        assert_eq!(response.into_text().unwrap(), "Added a test.");
    }

    #[test]
    fn blank_response_is_rejected() {
        let response: GenerateResponse = serde_json::from_str(r#"{"response": " \n"}"#).unwrap();
        assert!(matches!(response.into_text(), Err(LlmError::EmptyResponse)));
        let response: GenerateResponse = serde_json::from_str("{}").unwrap();
        assert!(matches!(response.into_text(), Err(LlmError::EmptyResponse)));
    }
}
