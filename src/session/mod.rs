//! Per-browser session state.
//!
//! A browser gets an opaque session id (carried in a cookie) when it signs
//! in. The id maps to a [`Session`] record in the [`SessionStore`] holding
//! the signed-in user and the [`ChatSession`] slots that survive page
//! reloads: `start_chat`, `thread_id` and the ordered `messages` log.
//! Signed-out visitors have no record; they see the default, idle state.
//!
//! # Example
//!
//! ```rust
//! use assistant_chat::session::{Message, SessionStore};
//!
//! let store = SessionStore::new();
//! let session = store.create();
//! session.update_chat(|chat| chat.push_message(Message::user("Hello!")));
//!
//! assert_eq!(session.chat().messages().len(), 1);
//! ```

mod chat_state;
mod store;

pub use chat_state::{ChatSession, Message, Role};
pub use store::{Session, SessionStore};
