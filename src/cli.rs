//! CLI interface for gitflow-toolkit.

use anyhow::Result;
use clap::{Parser, Subcommand};

pub mod commit;
pub mod config;
pub mod progress;

/// gitflow-toolkit: git commit workflow with AI-generated messages.
#[derive(Parser)]
#[command(name = "gitflow-toolkit")]
#[command(about = "Git commit workflow with AI-generated conventional commit messages", long_about = None)]
#[command(version)]
pub struct Cli {
    /// The main command to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Main command categories.
#[derive(Subcommand)]
pub enum Commands {
    /// Generates a commit message for the staged changes and commits them.
    Ci(commit::CommitCommand),
    /// Configuration information.
    Config(config::ConfigCommand),
}

impl Cli {
    /// Executes the CLI command.
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Ci(commit_cmd) => commit_cmd.execute().await,
            Commands::Config(config_cmd) => config_cmd.execute(),
        }
    }
}
