//! Chat orchestration.
//!
//! The [`ChatOrchestrator`] owns the idle/active lifecycle of a session's
//! chat and sequences a turn: record the user's message, forward it to the
//! assistant, stream the reply, then record the reply.

mod orchestrator;

pub use orchestrator::{ChatError, ChatEventStream, ChatOrchestrator, ChatTurn, RECOVERY_NOTICE};
