//! LLM configuration.
//!
//! Every key is resolved in order from gitconfig (`gitflow.<key>`), the
//! environment (`GITFLOW_<KEY>`, e.g. `GITFLOW_LLM_API_KEY`), the settings
//! file, and finally the built-in default:
//!
//! ```text
//! [gitflow]
//!     llm-api-key = sk-or-v1-xxxxx
//!     llm-model = mistralai/devstral-2512:free
//!     llm-temperature = 0.3
//! ```

pub mod settings;

use std::collections::HashMap;
use std::fmt::Display;
use std::num::NonZeroUsize;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::llm::prompts::Language;
use crate::llm::provider::{
    Protocol, DEFAULT_CHAT_HOST, DEFAULT_CHAT_MODEL, DEFAULT_LOCAL_HOST, DEFAULT_LOCAL_MODEL,
};
pub use settings::Settings;

/// Gitconfig section holding toolkit keys.
pub const GIT_CONFIG_SECTION: &str = "gitflow";

/// API key; its presence selects the chat protocol.
pub const KEY_API_KEY: &str = "llm-api-key";
/// API host, with or without scheme.
pub const KEY_API_HOST: &str = "llm-api-host";
/// API path override.
pub const KEY_API_PATH: &str = "llm-api-path";
/// Model name.
pub const KEY_MODEL: &str = "llm-model";
/// Sampling temperature.
pub const KEY_TEMPERATURE: &str = "llm-temperature";
/// Per-attempt request timeout (`90s`, `2m`, or plain seconds).
pub const KEY_REQUEST_TIMEOUT: &str = "llm-request-timeout";
/// Retries after the first failed attempt.
pub const KEY_MAX_RETRIES: &str = "llm-max-retries";
/// Commit message language.
pub const KEY_OUTPUT_LANG: &str = "llm-output-lang";
/// Context lines in the staged diff.
pub const KEY_DIFF_CONTEXT: &str = "llm-diff-context";
/// Maximum concurrent file analyses.
pub const KEY_MAX_CONCURRENCY: &str = "llm-max-concurrency";
/// System prompt override for file analysis.
pub const KEY_FILE_ANALYSIS_PROMPT: &str = "llm-file-analysis-prompt";
/// System prompt override for English commit messages.
pub const KEY_COMMIT_PROMPT_EN: &str = "llm-commit-prompt-en";
/// System prompt override for Chinese commit messages.
pub const KEY_COMMIT_PROMPT_ZH: &str = "llm-commit-prompt-zh";
/// System prompt override for bilingual commit messages.
pub const KEY_COMMIT_PROMPT_BILINGUAL: &str = "llm-commit-prompt-bilingual";

/// Default sampling temperature.
pub const DEFAULT_TEMPERATURE: f32 = 0.3;
/// Default per-attempt request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
/// Default retry count.
pub const DEFAULT_MAX_RETRIES: u32 = 0;
/// Default diff context lines.
pub const DEFAULT_DIFF_CONTEXT: u32 = 5;
/// Default analysis concurrency.
pub const DEFAULT_MAX_CONCURRENCY: usize = 3;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A key holds a value that cannot be used.
    #[error("Invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        /// Configuration key.
        key: &'static str,
        /// Offending raw value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },
}

/// A key-value lookup consulted when building [`LlmConfig`].
pub trait ConfigSource {
    /// Returns the raw value of `key` (e.g. `llm-model`), if set.
    fn lookup(&self, key: &str) -> Option<String>;
}

impl ConfigSource for HashMap<String, String> {
    fn lookup(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

/// Gitconfig, then environment, then settings file.
pub struct LayeredSource {
    git: Option<git2::Config>,
    settings: Settings,
}

impl LayeredSource {
    /// Opens the repository config (falling back to global config) and the
    /// settings file. Unreadable layers are skipped with a warning.
    pub fn load() -> Self {
        let git = git2::Repository::discover(".")
            .and_then(|repo| repo.config())
            .or_else(|_| git2::Config::open_default())
            .map_err(|e| warn!("Git configuration unavailable: {e}"))
            .ok();

        let settings = Settings::load().unwrap_or_else(|e| {
            warn!("Ignoring settings file: {e:#}");
            Settings::default()
        });

        Self { git, settings }
    }

    /// Environment variable consulted for `key`: `llm-api-key` → `GITFLOW_LLM_API_KEY`.
    pub fn env_var_name(key: &str) -> String {
        format!("GITFLOW_{}", key.to_uppercase().replace('-', "_"))
    }
}

impl ConfigSource for LayeredSource {
    fn lookup(&self, key: &str) -> Option<String> {
        let from_git = self.git.as_ref().and_then(|config| {
            config
                .get_string(&format!("{GIT_CONFIG_SECTION}.{key}"))
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        });

        from_git.or_else(|| self.settings.get_env_var(&Self::env_var_name(key)))
    }
}

/// Per-language system prompt overrides for commit message generation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitPromptOverrides {
    /// Override for [`Language::En`].
    pub en: Option<String>,
    /// Override for [`Language::Zh`].
    pub zh: Option<String>,
    /// Override for [`Language::Bilingual`].
    pub bilingual: Option<String>,
}

impl CommitPromptOverrides {
    /// Returns the override for `language`, if configured.
    pub fn for_language(&self, language: Language) -> Option<&str> {
        match language {
            Language::En => self.en.as_deref(),
            Language::Zh => self.zh.as_deref(),
            Language::Bilingual => self.bilingual.as_deref(),
        }
    }
}

/// Fully resolved LLM configuration.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Wire protocol (and credentials).
    pub protocol: Protocol,
    /// Normalized host, without trailing slash.
    pub host: String,
    /// API path override.
    pub api_path: Option<String>,
    /// Model name.
    pub model: String,
    /// Default sampling temperature.
    pub temperature: f32,
    /// Timeout applied to each attempt.
    pub request_timeout: Duration,
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Commit message language.
    pub language: Language,
    /// Context lines for the staged diff.
    pub diff_context: u32,
    /// Maximum concurrent file analyses.
    pub max_concurrency: NonZeroUsize,
    /// System prompt override for file analysis.
    pub file_analysis_prompt: Option<String>,
    /// System prompt overrides for commit generation.
    pub commit_prompts: CommitPromptOverrides,
}

impl LlmConfig {
    /// Resolves the configuration from gitconfig, environment and settings.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_source(&LayeredSource::load())
    }

    /// Resolves the configuration from an arbitrary source.
    pub fn from_source(source: &impl ConfigSource) -> Result<Self, ConfigError> {
        let lookup = |key: &str| source.lookup(key).filter(|v| !v.trim().is_empty());

        let api_key = lookup(KEY_API_KEY);
        let (default_host, default_model) = if api_key.is_some() {
            (DEFAULT_CHAT_HOST, DEFAULT_CHAT_MODEL)
        } else {
            (DEFAULT_LOCAL_HOST, DEFAULT_LOCAL_MODEL)
        };

        let host = match lookup(KEY_API_HOST) {
            Some(raw) => normalize_host(&raw)?,
            None => default_host.to_string(),
        };
        let protocol = Protocol::select(api_key.as_deref(), &host);

        let temperature: f32 = parse_or(source, KEY_TEMPERATURE, DEFAULT_TEMPERATURE)?;
        if !temperature.is_finite() || temperature < 0.0 {
            return Err(invalid(
                KEY_TEMPERATURE,
                temperature.to_string(),
                "must be a non-negative number",
            ));
        }

        let request_timeout = match lookup(KEY_REQUEST_TIMEOUT) {
            Some(raw) => parse_timeout(&raw)?,
            None => DEFAULT_REQUEST_TIMEOUT,
        };

        let language = match lookup(KEY_OUTPUT_LANG) {
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                warn!(value = %raw, "Unknown {KEY_OUTPUT_LANG}, using {}", Language::default());
                Language::default()
            }),
            None => Language::default(),
        };

        let concurrency: i64 = parse_or(source, KEY_MAX_CONCURRENCY, DEFAULT_MAX_CONCURRENCY as i64)?;
        let max_concurrency = usize::try_from(concurrency)
            .ok()
            .and_then(NonZeroUsize::new)
            .ok_or_else(|| {
                invalid(
                    KEY_MAX_CONCURRENCY,
                    concurrency.to_string(),
                    "must be greater than zero",
                )
            })?;

        let config = Self {
            protocol,
            host,
            api_path: source.lookup(KEY_API_PATH).map(|p| p.trim().to_string()),
            model: lookup(KEY_MODEL).unwrap_or_else(|| default_model.to_string()),
            temperature,
            request_timeout,
            max_retries: parse_or(source, KEY_MAX_RETRIES, DEFAULT_MAX_RETRIES)?,
            language,
            diff_context: parse_or(source, KEY_DIFF_CONTEXT, DEFAULT_DIFF_CONTEXT)?,
            max_concurrency,
            file_analysis_prompt: lookup(KEY_FILE_ANALYSIS_PROMPT),
            commit_prompts: CommitPromptOverrides {
                en: lookup(KEY_COMMIT_PROMPT_EN),
                zh: lookup(KEY_COMMIT_PROMPT_ZH),
                bilingual: lookup(KEY_COMMIT_PROMPT_BILINGUAL),
            },
        };

        debug!(
            provider = %config.protocol.name(),
            host = %config.host,
            model = %config.model,
            retries = config.max_retries,
            concurrency = config.max_concurrency.get(),
            "Resolved LLM configuration"
        );

        Ok(config)
    }

    /// Commit system prompt override for the configured language.
    pub fn commit_prompt_override(&self) -> Option<&str> {
        self.commit_prompts.for_language(self.language)
    }
}

fn invalid(key: &'static str, value: String, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key,
        value,
        reason: reason.into(),
    }
}

fn parse_or<T>(source: &impl ConfigSource, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    match source.lookup(key).map(|v| v.trim().to_string()) {
        Some(raw) if !raw.is_empty() => raw
            .parse()
            .map_err(|e: T::Err| invalid(key, raw.clone(), e.to_string())),
        _ => Ok(default),
    }
}

/// Accepts `humantime` durations (`90s`, `2m`, `1h30m`) or plain seconds.
fn parse_timeout(raw: &str) -> Result<Duration, ConfigError> {
    let raw = raw.trim();
    let timeout = match raw.parse::<u64>() {
        Ok(secs) => Duration::from_secs(secs),
        Err(_) => humantime::parse_duration(raw)
            .map_err(|e| invalid(KEY_REQUEST_TIMEOUT, raw.to_string(), e.to_string()))?,
    };
    if timeout.is_zero() {
        return Err(invalid(
            KEY_REQUEST_TIMEOUT,
            raw.to_string(),
            "must be greater than zero",
        ));
    }
    Ok(timeout)
}

/// Ensures the host has a scheme and no trailing slash.
fn normalize_host(raw: &str) -> Result<String, ConfigError> {
    let raw = raw.trim();
    let with_scheme = if raw.starts_with("http://") || raw.starts_with("https://") {
        raw.to_string()
    } else {
        format!("https://{raw}")
    };
    let host = with_scheme.trim_end_matches('/').to_string();

    Url::parse(&host).map_err(|e| invalid(KEY_API_HOST, raw.to_string(), e.to_string()))?;
    Ok(host)
}
