//! Provider selection: which wire protocol a client speaks and where.

use std::fmt;

/// Default host of a local Ollama server.
pub const DEFAULT_LOCAL_HOST: &str = "http://localhost:11434";

/// Default host used when an API key is configured.
pub const DEFAULT_CHAT_HOST: &str = "https://openrouter.ai";

/// Default model for the local protocol.
pub const DEFAULT_LOCAL_MODEL: &str = "qwen2.5-coder:7b";

/// Default model for the chat protocol.
pub const DEFAULT_CHAT_MODEL: &str = "mistralai/devstral-2512:free";

/// Endpoint path of the local generate API.
pub const LOCAL_GENERATE_PATH: &str = "/api/generate";

/// Hosted OpenAI-compatible services, distinguished only by their API prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatFlavor {
    /// OpenRouter (`/api/v1`).
    OpenRouter,
    /// Groq (`/openai/v1`).
    Groq,
    /// OpenAI or any other compatible service (`/v1`).
    OpenAi,
}

impl ChatFlavor {
    /// Infers the flavor from the configured host.
    pub fn detect(host: &str) -> Self {
        if host.contains("groq.com") {
            Self::Groq
        } else if host.contains("openrouter.ai") {
            Self::OpenRouter
        } else {
            Self::OpenAi
        }
    }

    /// API prefix that precedes `/chat/completions`.
    pub fn default_api_path(self) -> &'static str {
        match self {
            Self::OpenRouter => "/api/v1",
            Self::Groq => "/openai/v1",
            Self::OpenAi => "/v1",
        }
    }
}

impl fmt::Display for ChatFlavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::OpenRouter => "openrouter",
            Self::Groq => "groq",
            Self::OpenAi => "openai",
        })
    }
}

/// Wire protocol spoken by a [`GenerationClient`](super::GenerationClient).
#[derive(Clone, PartialEq, Eq)]
pub enum Protocol {
    /// Local single-prompt protocol (`POST /api/generate`).
    Local,
    /// OpenAI-compatible chat completions with bearer authentication.
    Chat {
        /// Service flavor, used for the default API path.
        flavor: ChatFlavor,
        /// Bearer token.
        api_key: String,
    },
}

impl Protocol {
    /// Selects the protocol: chat when an API key is present, local otherwise.
    pub fn select(api_key: Option<&str>, host: &str) -> Self {
        match api_key {
            Some(key) if !key.is_empty() => Self::Chat {
                flavor: ChatFlavor::detect(host),
                api_key: key.to_string(),
            },
            _ => Self::Local,
        }
    }

    /// Human-readable provider name for logs and `config show`.
    pub fn name(&self) -> String {
        match self {
            Self::Local => "ollama".to_string(),
            Self::Chat { flavor, .. } => flavor.to_string(),
        }
    }

    /// Builds the request URL from a normalized host and optional path override.
    ///
    /// For the chat protocol the path is the API prefix and
    /// `/chat/completions` is appended; for the local protocol the path is
    /// the full endpoint.
    pub fn endpoint_url(&self, host: &str, api_path: Option<&str>) -> String {
        let host = host.trim_end_matches('/');
        match self {
            Self::Local => {
                let path = api_path.unwrap_or(LOCAL_GENERATE_PATH);
                format!("{host}/{}", path.trim_matches('/'))
            }
            Self::Chat { flavor, .. } => {
                let prefix = api_path.unwrap_or(flavor.default_api_path());
                let prefix = prefix.trim_matches('/');
                if prefix.is_empty() {
                    format!("{host}/chat/completions")
                } else {
                    format!("{host}/{prefix}/chat/completions")
                }
            }
        }
    }
}

// Keep the API key out of debug output.
impl fmt::Debug for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => f.write_str("Local"),
            Self::Chat { flavor, .. } => f
                .debug_struct("Chat")
                .field("flavor", flavor)
                .field("api_key", &"<redacted>")
                .finish(),
        }
    }
}
