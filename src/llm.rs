//! Text generation backends.

pub mod client;
pub mod error;
mod ollama;
mod openai;
pub mod prompts;
pub mod provider;

#[cfg(test)]
pub(crate) mod test_utils;

pub use client::{GenerationClient, GenerationRequest, TextGenerator};
pub use error::{ErrorKind, LlmError};
pub use prompts::Language;
pub use provider::{ChatFlavor, Protocol};
