//! # gitflow-toolkit
//!
//! Git commit workflow with AI-generated conventional commit messages.
//!
//! The staged diff is split into per-file units, each unit is summarized by
//! a text generation backend with bounded concurrency, and the summaries are
//! synthesized into a single commit message.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use gitflow_toolkit::config::LlmConfig;
//! use gitflow_toolkit::git::split_diff;
//! use gitflow_toolkit::llm::GenerationClient;
//! use gitflow_toolkit::pipeline::{PipelineController, PipelineOptions, PipelineOutcome};
//!
//! # async fn run(diff: &str) -> anyhow::Result<()> {
//! let config = LlmConfig::load()?;
//! let controller = PipelineController::new(
//!     Arc::new(GenerationClient::from_config(&config)),
//!     PipelineOptions::from_config(&config),
//! );
//! if let PipelineOutcome::Completed(message) = controller.run(split_diff(diff)).await {
//!     println!("{message}");
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod cli;
pub mod config;
pub mod git;
pub mod llm;
pub mod pipeline;

pub use crate::cli::Cli;

/// The current version of gitflow-toolkit.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
