//! Streaming events sent to the browser during a chat turn.
//!
//! Each event is written as a Server-Sent Events frame with an `event:` line
//! carrying the event name and a `data:` line carrying the JSON payload.
//!
//! # Example
//!
//! ```rust
//! use assistant_chat::events::{ChatEvent, sse_event};
//!
//! let event = ChatEvent::MessageDelta {
//!     text: "Hello".to_string(),
//! };
//! let sse = sse_event(&event);
//! assert!(sse.contains("message.delta"));
//! ```

use serde::{Deserialize, Serialize};

use crate::assistant::AssistantError;

/// Events of one chat turn, in emission order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "data")]
pub enum ChatEvent {
    /// The turn was accepted and the assistant is being run.
    #[serde(rename = "stream.start")]
    StreamStart {
        /// Identifier of this turn, for log correlation.
        turn_id: String,
    },

    /// Incremental text of the assistant's reply.
    #[serde(rename = "message.delta")]
    MessageDelta { text: String },

    /// The session had no thread; a new chat was started instead of replying.
    #[serde(rename = "thread.recreated")]
    ThreadRecreated { notice: String },

    /// The turn failed. No assistant message was recorded.
    #[serde(rename = "error")]
    Error {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        code: Option<String>,
    },

    /// Terminal event of every turn.
    #[serde(rename = "done")]
    Done,
}

impl From<&AssistantError> for ChatEvent {
    fn from(err: &AssistantError) -> Self {
        Self::Error {
            message: err.to_string(),
            code: Some(err.code().to_string()),
        }
    }
}

/// Get the SSE event name for a [`ChatEvent`].
pub fn event_name(evt: &ChatEvent) -> &'static str {
    match evt {
        ChatEvent::StreamStart { .. } => "stream.start",
        ChatEvent::MessageDelta { .. } => "message.delta",
        ChatEvent::ThreadRecreated { .. } => "thread.recreated",
        ChatEvent::Error { .. } => "error",
        ChatEvent::Done => "done",
    }
}

/// Convert a [`ChatEvent`] to an SSE-formatted string.
pub fn sse_event(evt: &ChatEvent) -> String {
    let json = serde_json::to_string(evt).unwrap_or_else(|e| {
        serde_json::json!({ "type": "error", "data": { "message": e.to_string() } }).to_string()
    });

    format!("event: {}\ndata: {json}\n\n", event_name(evt))
}
