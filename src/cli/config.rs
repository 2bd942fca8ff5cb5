//! Configuration-related CLI commands.

use std::fmt::Write as _;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::config::LlmConfig;
use crate::llm::Protocol;

/// Configuration operations.
#[derive(Parser)]
pub struct ConfigCommand {
    /// Configuration subcommand to execute.
    #[command(subcommand)]
    pub command: ConfigSubcommands,
}

/// Configuration subcommands.
#[derive(Subcommand)]
pub enum ConfigSubcommands {
    /// Shows the resolved LLM configuration.
    Show(ShowCommand),
}

/// Show command options.
#[derive(Parser)]
pub struct ShowCommand {}

impl ConfigCommand {
    /// Executes the config command.
    pub fn execute(self) -> Result<()> {
        match self.command {
            ConfigSubcommands::Show(show_cmd) => show_cmd.execute(),
        }
    }
}

impl ShowCommand {
    /// Executes the show command.
    pub fn execute(self) -> Result<()> {
        let config = LlmConfig::load().context("Failed to load LLM configuration")?;
        print!("{}", render_config(&config));
        Ok(())
    }
}

/// Keeps the first and last four characters of a key.
pub fn mask_api_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}****{tail}")
}

fn prompt_source(value: Option<&str>) -> &'static str {
    if value.is_some() {
        "custom"
    } else {
        "default"
    }
}

/// Human-readable dump of the configuration.
pub fn render_config(config: &LlmConfig) -> String {
    let api_key = match &config.protocol {
        Protocol::Local => "(not set)".to_string(),
        Protocol::Chat { api_key, .. } => mask_api_key(api_key),
    };
    let endpoint = config
        .protocol
        .endpoint_url(&config.host, config.api_path.as_deref());

    let mut out = String::new();
    let _ = writeln!(out, "provider:            {}", config.protocol.name());
    let _ = writeln!(out, "endpoint:            {endpoint}");
    let _ = writeln!(out, "api key:             {api_key}");
    let _ = writeln!(out, "model:               {}", config.model);
    let _ = writeln!(out, "temperature:         {}", config.temperature);
    let _ = writeln!(
        out,
        "request timeout:     {}",
        humantime::format_duration(config.request_timeout)
    );
    let _ = writeln!(out, "max retries:         {}", config.max_retries);
    let _ = writeln!(out, "output language:     {}", config.language);
    let _ = writeln!(out, "diff context:        {}", config.diff_context);
    let _ = writeln!(out, "max concurrency:     {}", config.max_concurrency);
    let _ = writeln!(
        out,
        "file prompt:         {}",
        prompt_source(config.file_analysis_prompt.as_deref())
    );
    let _ = writeln!(
        out,
        "commit prompt:       {}",
        prompt_source(config.commit_prompt_override())
    );
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn mask_keeps_ends_only() {
        assert_eq!(mask_api_key("sk-or-v1-abcdef123456"), "sk-o****3456");
        assert_eq!(mask_api_key("short"), "*****");
        assert_eq!(mask_api_key(""), "");
    }

    #[test]
    fn render_never_prints_the_key() {
        let source: HashMap<String, String> = [
            ("llm-api-key", "sk-or-v1-supersecretvalue"),
            ("llm-output-lang", "bilingual"),
            ("llm-commit-prompt-bilingual", "custom prompt"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        let config = LlmConfig::from_source(&source).unwrap();

        let rendered = render_config(&config);
        assert!(!rendered.contains("supersecret"));
        assert!(rendered.contains("api key:             sk-o****alue"));
        assert!(rendered.contains("endpoint:            https://openrouter.ai/api/v1/chat/completions"));
        assert!(rendered.contains("request timeout:     2m"));
        assert!(rendered.contains("output language:     bilingual"));
        assert!(rendered.contains("commit prompt:       custom"));
        assert!(rendered.contains("file prompt:         default"));
    }

    #[test]
    fn render_local_defaults() {
        let config = LlmConfig::from_source(&HashMap::new()).unwrap();
        let rendered = render_config(&config);
        assert!(rendered.starts_with("provider:            ollama\n"));
        assert!(rendered.contains("endpoint:            http://localhost:11434/api/generate"));
        assert!(rendered.contains("api key:             (not set)"));
    }
}
