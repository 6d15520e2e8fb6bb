//! Hosted assistant service boundary.
//!
//! The [`AssistantService`] trait covers the four calls the chat needs:
//! describing the configured assistant, creating a thread, posting a
//! message to it and running the assistant with a streamed reply.
//!
//! # Implementations
//!
//! - [`OpenAiAssistants`]: `OpenAI` Assistants v2 HTTP API

pub mod openai;
pub mod sse;

pub use openai::OpenAiAssistants;

use std::fmt;
use std::pin::Pin;

use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::session::Role;

/// Identifier of a conversation thread on the assistant service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThreadId(String);

impl ThreadId {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ThreadId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ThreadId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Metadata of the configured assistant.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AssistantInfo {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

/// Parameters of one assistant run on a thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    pub thread_id: ThreadId,
    pub assistant_id: String,
    pub model: String,
    pub instructions: Option<String>,
}

/// Items of a streamed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunEvent {
    /// A fragment of the assistant's reply text.
    TextDelta(String),
    /// The run finished successfully.
    Completed,
}

/// Lazy, finite stream of run events.
pub type RunStream = Pin<Box<dyn Stream<Item = Result<RunEvent, AssistantError>> + Send>>;

#[derive(Debug, thiserror::Error)]
pub enum AssistantError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The run ended in a non-successful state.
    #[error("run {status}: {message}")]
    Run { status: String, message: String },

    #[error("stream ended before the run completed")]
    Incomplete,
}

impl AssistantError {
    /// Short machine-readable code for the browser.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Http(_) => "http",
            Self::Json(_) => "decode",
            Self::Api { .. } => "api",
            Self::Run { .. } => "run",
            Self::Incomplete => "incomplete",
        }
    }
}

/// Operations consumed from the hosted assistant service.
#[async_trait::async_trait]
pub trait AssistantService: Send + Sync + fmt::Debug {
    /// Retrieve the assistant's metadata.
    async fn describe(&self, assistant_id: &str) -> Result<AssistantInfo, AssistantError>;

    /// Create an empty conversation thread.
    async fn create_thread(&self) -> Result<ThreadId, AssistantError>;

    /// Append a message to a thread.
    async fn post_message(
        &self,
        thread_id: &ThreadId,
        role: Role,
        content: &str,
    ) -> Result<(), AssistantError>;

    /// Run the assistant on a thread and stream its reply.
    async fn stream_run(&self, run: RunRequest) -> Result<RunStream, AssistantError>;
}
