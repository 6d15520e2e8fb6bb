use std::pin::Pin;
use std::sync::Arc;

use futures::{Stream, StreamExt};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::assistant::{AssistantError, AssistantService, RunEvent, RunRequest, ThreadId};
use crate::config::ChatSettings;
use crate::events::ChatEvent;
use crate::session::{ChatSession, Message, Role, Session};

/// Shown when a turn arrives for a session without a thread.
pub const RECOVERY_NOTICE: &str = "Thread ID is missing. Starting a new chat session.";

/// Events of a streaming turn. Always ends with [`ChatEvent::Done`].
pub type ChatEventStream = Pin<Box<dyn Stream<Item = ChatEvent> + Send>>;

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("message cannot be empty")]
    EmptyInput,

    #[error("no chat has been started")]
    NotStarted,

    #[error(transparent)]
    Assistant(#[from] AssistantError),
}

/// Outcome of submitting user input.
pub enum ChatTurn {
    /// The session had no thread. A new chat was started and no reply
    /// will be produced for this input.
    Recovered { notice: String },
    /// The reply is being streamed.
    Streaming(ChatEventStream),
}

impl std::fmt::Debug for ChatTurn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Recovered { notice } => f.debug_struct("Recovered").field("notice", notice).finish(),
            Self::Streaming(_) => f.write_str("Streaming(..)"),
        }
    }
}

/// Drives chat sessions against the assistant service.
#[derive(Debug, Clone)]
pub struct ChatOrchestrator {
    assistant: Arc<dyn AssistantService>,
    assistant_id: String,
    model: String,
    instructions: Option<String>,
}

impl ChatOrchestrator {
    #[must_use]
    pub fn new(assistant: Arc<dyn AssistantService>, settings: &ChatSettings) -> Self {
        Self {
            assistant,
            assistant_id: settings.assistant_id.clone(),
            model: settings.model.clone(),
            instructions: settings.instructions.clone(),
        }
    }

    /// Open a fresh thread and make the session's chat active on it.
    ///
    /// Prior messages are dropped. On failure the session is left untouched.
    pub async fn start_new_chat(&self, session: &Session) -> Result<ThreadId, ChatError> {
        let thread_id = self.assistant.create_thread().await?;
        session.update_chat(|chat| chat.begin(thread_id.clone()));

        info!(
            name: "chat.session.started",
            session_id = %session.id(),
            thread_id = %thread_id,
            "New chat session started"
        );
        Ok(thread_id)
    }

    /// Return the session's chat to idle.
    pub fn reset(&self, session: &Session) {
        session.update_chat(ChatSession::reset);
        info!(name: "chat.session.reset", session_id = %session.id(), "Chat session reset");
    }

    /// Submit user input on an active chat.
    ///
    /// The user's message is recorded before anything is sent. When the
    /// session has no thread, a new chat is started and
    /// [`ChatTurn::Recovered`] is returned; otherwise the reply is streamed.
    pub async fn submit(&self, session: &Session, input: &str) -> Result<ChatTurn, ChatError> {
        if input.trim().is_empty() {
            return Err(ChatError::EmptyInput);
        }

        let thread_id = session.update_chat(|chat| {
            if !chat.start_chat() {
                return Err(ChatError::NotStarted);
            }
            chat.push_message(Message::user(input));
            Ok(chat.thread_id().cloned())
        })?;

        let Some(thread_id) = thread_id else {
            warn!(
                name: "chat.thread.missing",
                session_id = %session.id(),
                "Thread ID missing on active chat, starting a new one"
            );
            self.start_new_chat(session).await?;
            return Ok(ChatTurn::Recovered {
                notice: RECOVERY_NOTICE.to_string(),
            });
        };

        Ok(ChatTurn::Streaming(Box::pin(self.stream_turn(
            session.clone(),
            thread_id,
            input.to_string(),
        ))))
    }

    fn run_request(&self, thread_id: &ThreadId) -> RunRequest {
        RunRequest {
            thread_id: thread_id.clone(),
            assistant_id: self.assistant_id.clone(),
            model: self.model.clone(),
            instructions: self.instructions.clone(),
        }
    }

    fn stream_turn(
        &self,
        session: Session,
        thread_id: ThreadId,
        input: String,
    ) -> impl Stream<Item = ChatEvent> + Send + 'static {
        let assistant = Arc::clone(&self.assistant);
        let run = self.run_request(&thread_id);
        let turn_id = Uuid::new_v4().to_string();

        async_stream::stream! {
            yield ChatEvent::StreamStart { turn_id: turn_id.clone() };

            if let Err(e) = assistant.post_message(&thread_id, Role::User, &input).await {
                error!(turn_id = %turn_id, thread_id = %thread_id, error = %e, "Failed to post message");
                yield ChatEvent::from(&e);
                yield ChatEvent::Done;
                return;
            }

            let mut events = match assistant.stream_run(run).await {
                Ok(s) => s,
                Err(e) => {
                    error!(turn_id = %turn_id, thread_id = %thread_id, error = %e, "Failed to start run");
                    yield ChatEvent::from(&e);
                    yield ChatEvent::Done;
                    return;
                }
            };

            let mut reply = String::new();
            let mut completed = false;
            while let Some(event) = events.next().await {
                match event {
                    Ok(RunEvent::TextDelta(text)) => {
                        reply.push_str(&text);
                        yield ChatEvent::MessageDelta { text };
                    }
                    Ok(RunEvent::Completed) => completed = true,
                    Err(e) => {
                        error!(turn_id = %turn_id, thread_id = %thread_id, error = %e, "Run stream failed");
                        yield ChatEvent::from(&e);
                        yield ChatEvent::Done;
                        return;
                    }
                }
            }

            if !completed {
                let e = AssistantError::Incomplete;
                error!(turn_id = %turn_id, thread_id = %thread_id, "Run stream ended early");
                yield ChatEvent::from(&e);
                yield ChatEvent::Done;
                return;
            }

            let reply_len = reply.len();
            let recorded = session.update_chat(|chat| {
                if chat.thread_id() == Some(&thread_id) {
                    chat.push_message(Message::assistant(reply));
                    true
                } else {
                    false
                }
            });

            if recorded {
                info!(
                    name: "chat.turn.completed",
                    turn_id = %turn_id,
                    session_id = %session.id(),
                    thread_id = %thread_id,
                    content_length = reply_len,
                    "Saved assistant response to session"
                );
            } else {
                debug!(
                    turn_id = %turn_id,
                    session_id = %session.id(),
                    "Thread changed during the turn, reply discarded"
                );
            }

            yield ChatEvent::Done;
        }
    }
}
