//! `ci`: AI-assisted commit of the staged changes.

use std::io::{self, Write};
use std::num::NonZeroUsize;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::style::Stylize;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use tracing::{debug, info};

use super::progress;
use crate::config::LlmConfig;
use crate::git::commit::{clean_generated_message, finalize_message, is_conventional_header};
use crate::git::{split_diff, DiffUnit, GitRepository};
use crate::llm::{GenerationClient, Language, TextGenerator};
use crate::pipeline::{PipelineController, PipelineOptions, PipelineOutcome};

/// Generates a commit message for the staged changes and commits them.
#[derive(Parser)]
pub struct CommitCommand {
    /// Commits without asking for confirmation.
    #[arg(short, long)]
    pub yes: bool,

    /// Prints the generated message without committing.
    #[arg(long)]
    pub dry_run: bool,

    /// Omits the Signed-off-by trailer.
    #[arg(long)]
    pub no_signoff: bool,

    /// Model to use (overrides gitflow.llm-model).
    #[arg(long)]
    pub model: Option<String>,

    /// Message language: en, zh or bilingual (overrides gitflow.llm-output-lang).
    #[arg(long)]
    pub lang: Option<Language>,

    /// Maximum concurrent file analyses (overrides gitflow.llm-max-concurrency).
    #[arg(long)]
    pub concurrency: Option<NonZeroUsize>,
}

/// Answer to the confirmation prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    /// Commit with the previewed message.
    Commit,
    /// Generate a new message.
    Retry,
    /// Leave without committing.
    Quit,
}

impl CommitCommand {
    /// Executes the commit command.
    pub async fn execute(self) -> Result<()> {
        let repo = GitRepository::open().context("Failed to open git repository")?;
        repo.ensure_staged_files()?;

        let config = self.resolve_config()?;
        let diff = repo.staged_diff(config.diff_context)?;
        let units = split_diff(&diff);
        if units.is_empty() {
            bail!("Staged diff contains no file changes");
        }

        let sign_off = if self.no_signoff {
            None
        } else {
            repo.sign_off_line()
        };

        let generator: Arc<dyn TextGenerator> = Arc::new(GenerationClient::from_config(&config));
        let options = PipelineOptions::from_config(&config);
        eprintln!(
            "Analyzing {} file(s) with {} (model: {}, concurrency: {})",
            units.len(),
            config.protocol.name(),
            config.model,
            config.max_concurrency
        );

        loop {
            let Some(raw) = generate_message(&generator, &options, units.clone()).await? else {
                eprintln!("{}", "Cancelled.".yellow());
                return Ok(());
            };

            let message = finalize_message(&clean_generated_message(&raw), sign_off.as_deref());
            if !is_conventional_header(&message) {
                eprintln!(
                    "{} generated header does not follow type(scope): subject",
                    "warning:".yellow()
                );
            }

            if self.dry_run {
                print!("{message}");
                return Ok(());
            }

            eprintln!("\n{}\n", message.trim_end());
            let choice = if self.yes {
                Choice::Commit
            } else {
                prompt_choice()?
            };

            match choice {
                Choice::Commit => {
                    let oid = repo.commit_staged(&message)?;
                    info!(commit = %oid, "Created commit");
                    eprintln!("{} {}", "Committed".green(), &oid[..oid.len().min(7)]);
                    return Ok(());
                }
                Choice::Retry => {
                    debug!("Regenerating commit message");
                }
                Choice::Quit => {
                    eprintln!("Nothing committed.");
                    return Ok(());
                }
            }
        }
    }

    fn resolve_config(&self) -> Result<LlmConfig> {
        let mut config = LlmConfig::load().context("Failed to load LLM configuration")?;
        if let Some(model) = &self.model {
            config.model.clone_from(model);
        }
        if let Some(lang) = self.lang {
            config.language = lang;
        }
        if let Some(concurrency) = self.concurrency {
            config.max_concurrency = concurrency;
        }
        Ok(config)
    }
}

/// Runs one pipeline with progress output; Ctrl+C cancels it.
///
/// Returns `None` when cancelled.
async fn generate_message(
    generator: &Arc<dyn TextGenerator>,
    options: &PipelineOptions,
    units: Vec<DiffUnit>,
) -> Result<Option<String>> {
    let paths = units.iter().map(|u| u.path.clone()).collect();
    let controller = PipelineController::new(Arc::clone(generator), options.clone());

    let token = controller.cancellation_token();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            token.cancel();
        }
    });
    let renderer = tokio::spawn(progress::render(controller.subscribe(), paths));

    let outcome = controller.run(units).await;
    interrupt.abort();
    drop(controller);
    // The renderer exits once the progress sender is gone.
    let _ = renderer.await;

    match outcome {
        PipelineOutcome::Completed(message) => Ok(Some(message)),
        PipelineOutcome::Cancelled => Ok(None),
        PipelineOutcome::Failed(err) => Err(err.into()),
    }
}

/// Guard that disables raw mode on drop.
struct RawModeGuard;

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
    }
}

fn prompt_choice() -> Result<Choice> {
    eprint!("Commit this message? [y]es / [r]etry / [q]uit ");
    io::stderr().flush()?;

    enable_raw_mode()?;
    let _guard = RawModeGuard;

    loop {
        if let Event::Key(key_event) = event::read()? {
            if let Some(choice) = choice_for_key(&key_event) {
                eprint!("\r\n");
                io::stderr().flush()?;
                return Ok(choice);
            }
        }
    }
}

/// Maps a key press to a [`Choice`]; other keys are ignored.
pub fn choice_for_key(key_event: &KeyEvent) -> Option<Choice> {
    if key_event.kind != KeyEventKind::Press {
        return None;
    }
    match key_event.code {
        KeyCode::Char('c') if key_event.modifiers.contains(KeyModifiers::CONTROL) => {
            Some(Choice::Quit)
        }
        KeyCode::Char('y' | 'Y') | KeyCode::Enter => Some(Choice::Commit),
        KeyCode::Char('r' | 'R') => Some(Choice::Retry),
        KeyCode::Char('q' | 'Q') | KeyCode::Esc => Some(Choice::Quit),
        _ => None,
    }
}
