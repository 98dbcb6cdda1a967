//! Boundary to the automation backend.
//!
//! Each operation is one named call taking a JSON argument bag. Streaming operations emit plain
//! text log lines on their channel for the duration of the call.

pub mod http;
#[cfg(test)]
pub mod scripted;

use async_trait::async_trait;
use serde_json::Value;

use crate::core::logstream::LogEmitter;

pub use http::HttpBackend;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub message: String,
    /// Items the backend reports as processed, when it reports a count at all.
    pub processed: Option<u64>,
}

impl Outcome {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            processed: None,
        }
    }

    pub fn counted(message: impl Into<String>, processed: u64) -> Self {
        Self {
            message: message.into(),
            processed: Some(processed),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// The backend ran the call and rejected it; the message is shown verbatim.
    #[error("{0}")]
    Rejected(String),
    #[error("Backend unreachable: {0}")]
    Transport(String),
    #[error("Unexpected backend response: {0}")]
    Protocol(String),
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        BackendError::Transport(err.to_string())
    }
}

#[async_trait]
pub trait Backend: Send + Sync {
    /// Run `command` to completion. `logs` is `None` for operations without a log channel.
    async fn invoke(
        &self,
        command: &str,
        args: Value,
        logs: Option<LogEmitter>,
    ) -> Result<Outcome, BackendError>;

    /// Send an operation's no-argument cancel command to the most recent in-flight call.
    async fn cancel(&self, cancel_command: &str) -> Result<(), BackendError>;
}
