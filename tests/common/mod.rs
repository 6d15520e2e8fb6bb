//! Shared fixtures: a scripted in-process assistant and test settings.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use assistant_chat::AppState;
use assistant_chat::assistant::{
    AssistantError, AssistantInfo, AssistantService, RunEvent, RunRequest, RunStream, ThreadId,
};
use assistant_chat::auth::{CredentialTable, hash_password};
use assistant_chat::config::{AppConfig, ChatSettings};
use assistant_chat::session::Role;

/// How the fake assistant answers the next run.
#[derive(Debug, Clone)]
pub enum Script {
    /// Stream these deltas, then complete.
    Reply(Vec<&'static str>),
    /// Reject the posted message.
    FailPost,
    /// Reject thread creation.
    FailCreateThread,
    /// Stream these deltas, then fail.
    FailMidStream(Vec<&'static str>),
    /// Stream these deltas and end without a completion event.
    NoCompletion(Vec<&'static str>),
}

#[derive(Debug)]
pub struct FakeAssistant {
    threads_created: AtomicUsize,
    pub posted: Mutex<Vec<(ThreadId, Role, String)>>,
    pub runs: Mutex<Vec<RunRequest>>,
    script: Mutex<Script>,
}

impl FakeAssistant {
    pub fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            threads_created: AtomicUsize::new(0),
            posted: Mutex::new(Vec::new()),
            runs: Mutex::new(Vec::new()),
            script: Mutex::new(script),
        })
    }

    pub fn replying(deltas: Vec<&'static str>) -> Arc<Self> {
        Self::new(Script::Reply(deltas))
    }

    pub fn set_script(&self, script: Script) {
        *self.script.lock().unwrap() = script;
    }

    pub fn threads_created(&self) -> usize {
        self.threads_created.load(Ordering::SeqCst)
    }

    fn script(&self) -> Script {
        self.script.lock().unwrap().clone()
    }
}

fn api_error(message: &str) -> AssistantError {
    AssistantError::Api {
        status: 500,
        message: message.to_string(),
    }
}

fn deltas(texts: &[&'static str]) -> Vec<Result<RunEvent, AssistantError>> {
    texts
        .iter()
        .map(|t| Ok(RunEvent::TextDelta((*t).to_string())))
        .collect()
}

#[async_trait::async_trait]
impl AssistantService for FakeAssistant {
    async fn describe(&self, assistant_id: &str) -> Result<AssistantInfo, AssistantError> {
        Ok(AssistantInfo {
            id: assistant_id.to_string(),
            name: Some("Fake".to_string()),
            model: None,
        })
    }

    async fn create_thread(&self) -> Result<ThreadId, AssistantError> {
        if matches!(self.script(), Script::FailCreateThread) {
            return Err(api_error("thread creation failed"));
        }
        let n = self.threads_created.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(ThreadId::from(format!("thread_{n}")))
    }

    async fn post_message(
        &self,
        thread_id: &ThreadId,
        role: Role,
        content: &str,
    ) -> Result<(), AssistantError> {
        if matches!(self.script(), Script::FailPost) {
            return Err(api_error("post failed"));
        }
        self.posted
            .lock()
            .unwrap()
            .push((thread_id.clone(), role, content.to_string()));
        Ok(())
    }

    async fn stream_run(&self, run: RunRequest) -> Result<RunStream, AssistantError> {
        self.runs.lock().unwrap().push(run);
        let events = match self.script() {
            Script::Reply(texts) => {
                let mut events = deltas(&texts);
                events.push(Ok(RunEvent::Completed));
                events
            }
            Script::FailMidStream(texts) => {
                let mut events = deltas(&texts);
                events.push(Err(AssistantError::Run {
                    status: "failed".to_string(),
                    message: "server_error".to_string(),
                }));
                events
            }
            Script::NoCompletion(texts) => deltas(&texts),
            Script::FailPost | Script::FailCreateThread => Vec::new(),
        };
        Ok(Box::pin(futures::stream::iter(events)))
    }
}

pub fn settings() -> ChatSettings {
    let env = HashMap::from([
        ("API_KEY", "sk-test"),
        ("ASSISTANT_KEY", "asst_123"),
        ("OPENAI_MODEL", "gpt-4o"),
        ("INSTRUCTIONS", "Answer briefly."),
        ("PAGE_TITLE", "xFLOWer Knowledge Base"),
        ("WELCOME_MESSAGE", "How can I help today?"),
        ("USER_PROMPT", "Ask about xFLOWer"),
        ("BEGIN_MESSAGE", "Start a new chat to begin."),
        ("EXIT_MESSAGE", "Thanks for stopping by!"),
    ]);
    ChatSettings::from_lookup(|key| env.get(key).map(ToString::to_string)).unwrap()
}

pub const USERNAME: &str = "bruno";
pub const PASSWORD: &str = "correct horse";

pub fn credentials() -> CredentialTable {
    CredentialTable::from_records(vec![(
        USERNAME.to_string(),
        "Peter Parker".to_string(),
        hash_password(PASSWORD).unwrap(),
    )])
    .unwrap()
}

pub fn app_state(assistant: Arc<FakeAssistant>) -> AppState {
    app_state_with_config(assistant, AppConfig::defaults().unwrap())
}

pub fn app_state_with_config(assistant: Arc<FakeAssistant>, config: AppConfig) -> AppState {
    AppState::new(
        Arc::new(config),
        Arc::new(settings()),
        credentials(),
        assistant,
    )
}
