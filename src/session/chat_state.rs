//! Chat slots of a browser session.

use serde::{Deserialize, Serialize};

use crate::assistant::ThreadId;

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// A single entry of the message log. Never modified once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Chat state of one browser session.
///
/// Defaults to idle: no thread, no messages. [`ChatSession::begin`] moves
/// it to active on a fresh thread and [`ChatSession::reset`] returns it to
/// the default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSession {
    start_chat: bool,
    thread_id: Option<ThreadId>,
    messages: Vec<Message>,
}

impl ChatSession {
    /// Whether the chat is active (history and input box shown).
    #[must_use]
    pub fn start_chat(&self) -> bool {
        self.start_chat
    }

    pub fn set_start_chat(&mut self, started: bool) {
        self.start_chat = started;
    }

    #[must_use]
    pub fn thread_id(&self) -> Option<&ThreadId> {
        self.thread_id.as_ref()
    }

    pub fn set_thread_id(&mut self, thread_id: Option<ThreadId>) {
        self.thread_id = thread_id;
    }

    /// Messages in the order they were appended.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn push_message(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Start a new conversation on `thread_id`, dropping prior messages.
    pub fn begin(&mut self, thread_id: ThreadId) {
        self.set_thread_id(Some(thread_id));
        self.messages.clear();
        self.set_start_chat(true);
    }

    /// Back to idle: no thread, no messages.
    pub fn reset(&mut self) {
        self.messages.clear();
        self.set_start_chat(false);
        self.set_thread_id(None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_idle_without_thread() {
        let chat = ChatSession::default();
        assert!(!chat.start_chat());
        assert!(chat.thread_id().is_none());
        assert!(chat.messages().is_empty());
    }

    #[test]
    fn test_begin_clears_prior_messages() {
        let mut chat = ChatSession::default();
        chat.begin(ThreadId::from("thread_1"));
        chat.push_message(Message::user("m1"));
        chat.push_message(Message::assistant("m2"));

        chat.begin(ThreadId::from("thread_2"));

        assert!(chat.start_chat());
        assert!(chat.messages().is_empty());
        assert_eq!(chat.thread_id().map(ThreadId::as_str), Some("thread_2"));
    }

    #[test]
    fn test_reset_restores_default() {
        let mut chat = ChatSession::default();
        chat.begin(ThreadId::from("thread_1"));
        chat.push_message(Message::user("Hello"));

        chat.reset();

        assert_eq!(chat, ChatSession::default());
    }

    #[test]
    fn test_message_role_serialization() {
        let json = serde_json::to_string(&Message::assistant("Hi")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"Hi"}"#);
    }
}
