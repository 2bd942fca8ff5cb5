//! Generation client errors.

use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

/// Coarse classification of a [`LlmError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Network, HTTP or provider failure; may succeed on another attempt.
    Transient,
    /// The provider answered but the answer is unusable.
    ContractViolation,
    /// The caller's cancellation signal fired.
    Cancelled,
}

/// Errors produced by a text generation call.
#[derive(Error, Debug)]
pub enum LlmError {
    /// Non-success HTTP status.
    #[error("HTTP {status}: {body}")]
    Status {
        /// Response status.
        status: StatusCode,
        /// Response body, possibly empty.
        body: String,
    },

    /// The provider returned an error object.
    #[error("Provider error: {0}")]
    Provider(String),

    /// Connection or request failure.
    #[error("Network error: {0}")]
    Transport(String),

    /// An attempt exceeded the request timeout.
    #[error("Request timed out after {}", format_timeout(.0))]
    Timeout(Duration),

    /// The response body could not be decoded.
    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    /// A chat response carried no choices.
    #[error("No choices in response")]
    EmptyChoices,

    /// The response text was empty after trimming.
    #[error("Empty response")]
    EmptyResponse,

    /// The call was cancelled.
    #[error("Request cancelled")]
    Cancelled,

    /// The task running the call panicked.
    #[error("Generation task failed: {0}")]
    TaskFailed(String),

    /// Every attempt failed.
    #[error("Request failed after {attempts} attempt(s)")]
    Exhausted {
        /// Number of attempts made.
        attempts: u32,
        /// Error of the final attempt.
        #[source]
        last: Box<LlmError>,
    },
}

fn format_timeout(timeout: &Duration) -> humantime::FormattedDuration {
    humantime::format_duration(*timeout)
}

impl LlmError {
    /// Classifies the error; exhausted retries report the final attempt's kind.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Status { .. }
            | Self::Provider(_)
            | Self::Transport(_)
            | Self::Timeout(_)
            | Self::InvalidResponse(_)
            | Self::TaskFailed(_) => ErrorKind::Transient,
            Self::EmptyChoices | Self::EmptyResponse => ErrorKind::ContractViolation,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Exhausted { last, .. } => last.kind(),
        }
    }

    /// Shorthand for `kind() == ErrorKind::Cancelled`.
    pub fn is_cancelled(&self) -> bool {
        self.kind() == ErrorKind::Cancelled
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::InvalidResponse(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds() {
        assert_eq!(
            LlmError::Timeout(Duration::from_secs(1)).kind(),
            ErrorKind::Transient
        );
        assert_eq!(
            LlmError::Status {
                status: StatusCode::BAD_GATEWAY,
                body: String::new()
            }
            .kind(),
            ErrorKind::Transient
        );
        assert_eq!(LlmError::EmptyChoices.kind(), ErrorKind::ContractViolation);
        assert_eq!(LlmError::EmptyResponse.kind(), ErrorKind::ContractViolation);
        assert!(LlmError::Cancelled.is_cancelled());
    }

    #[test]
    fn exhausted_reports_last_kind() {
        let err = LlmError::Exhausted {
            attempts: 3,
            last: Box::new(LlmError::EmptyChoices),
        };
        assert_eq!(err.kind(), ErrorKind::ContractViolation);
        assert_eq!(err.to_string(), "Request failed after 3 attempt(s)");
        assert_eq!(
            std::error::Error::source(&err).map(ToString::to_string),
            Some("No choices in response".to_string())
        );
    }

    #[test]
    fn timeout_message_is_human_readable() {
        assert_eq!(
            LlmError::Timeout(Duration::from_secs(120)).to_string(),
            "Request timed out after 2m"
        );
    }
}
