//! Assistant Chat
//!
//! A small authenticated web chat front-end. Signed-in users get a
//! conversation thread on a hosted assistant service and the assistant's
//! replies are streamed into the page over Server-Sent Events.
//!
//! # Architecture
//!
//! - **Server**: Axum HTTP server rendering the login/chat pages and streaming turns
//! - **Auth**: credential table with argon2 hashes behind a login gate
//! - **Session**: per-browser chat state (`start_chat`, `thread_id`, `messages`)
//! - **Chat**: orchestrator sequencing message submission and streamed replies
//!
//! # Modules
//!
//! - [`assistant`]: hosted assistant service boundary and its `OpenAI` client
//! - [`auth`]: credential loading and the authentication gate
//! - [`chat`]: chat orchestrator
//! - [`events`]: streaming event model sent to the browser
//! - [`session`]: per-browser session store

// Allow pedantic clippy warnings that don't add value for this codebase
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::implicit_hasher)]
#![allow(clippy::cargo_common_metadata)]
#![allow(clippy::multiple_crate_versions)]
#![allow(clippy::unused_async)]

pub mod assistant;
pub mod auth;
pub mod chat;
pub mod config;
pub mod error;
pub mod events;
pub mod rate_limit;
pub mod server;
pub mod session;
pub mod telemetry;
pub mod ui;

use std::sync::Arc;

use assistant::AssistantService;
use auth::{AuthGate, CredentialTable};
use chat::ChatOrchestrator;
use config::{AppConfig, ChatSettings};
use rate_limit::SimpleRateLimiter;
use session::SessionStore;

/// Application state shared across all handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Server, auth and session configuration.
    pub config: Arc<AppConfig>,
    /// Assistant credentials and page copy.
    pub settings: Arc<ChatSettings>,
    /// Login gate over the credential table.
    pub auth: AuthGate,
    /// Per-browser session store.
    pub sessions: SessionStore,
    /// Chat orchestrator driving the assistant.
    pub orchestrator: Arc<ChatOrchestrator>,
    /// Throttle for login attempts.
    pub login_limiter: Arc<SimpleRateLimiter>,
}

impl AppState {
    /// Wire the shared state from its collaborators.
    #[must_use]
    pub fn new(
        config: Arc<AppConfig>,
        settings: Arc<ChatSettings>,
        credentials: CredentialTable,
        assistant: Arc<dyn AssistantService>,
    ) -> Self {
        let orchestrator = Arc::new(ChatOrchestrator::new(assistant, &settings));
        let login_limiter = Arc::new(SimpleRateLimiter::new(
            config.auth.login_requests_per_second,
            config.auth.login_burst,
        ));

        Self {
            auth: AuthGate::new(Arc::new(credentials)),
            sessions: SessionStore::new(),
            orchestrator,
            login_limiter,
            config,
            settings,
        }
    }
}
