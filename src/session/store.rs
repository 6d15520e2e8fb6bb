//! Session records and their store.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::ChatSession;
use crate::auth::AuthenticatedUser;

/// One browser session.
///
/// Cloning is cheap and every clone refers to the same record, so a
/// streaming turn can hold on to its session after the request handler
/// has returned.
#[derive(Debug, Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

#[derive(Debug)]
struct SessionInner {
    /// Opaque identifier carried in the session cookie.
    id: String,
    last_activity: RwLock<DateTime<Utc>>,
    /// Signed-in user, if any.
    user: RwLock<Option<AuthenticatedUser>>,
    chat: RwLock<ChatSession>,
}

// Session data stays consistent across a panicked writer, so poisoning is ignored.
fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

impl Session {
    fn new(id: String) -> Self {
        let now = Utc::now();
        Self {
            inner: Arc::new(SessionInner {
                id,
                last_activity: RwLock::new(now),
                user: RwLock::new(None),
                chat: RwLock::new(ChatSession::default()),
            }),
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    #[must_use]
    pub fn user(&self) -> Option<AuthenticatedUser> {
        read(&self.inner.user).clone()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        read(&self.inner.user).is_some()
    }

    /// Bind a user to this session. Chat state left by a previous user is dropped.
    pub fn sign_in(&self, user: AuthenticatedUser) {
        let mut guard = write(&self.inner.user);
        if guard.as_ref().is_some_and(|u| u.username != user.username) {
            write(&self.inner.chat).reset();
        }
        *guard = Some(user);
        drop(guard);
        self.touch();
    }

    /// Clear the signed-in user and reset the chat slots.
    pub fn sign_out(&self) {
        *write(&self.inner.user) = None;
        write(&self.inner.chat).reset();
        self.touch();
    }

    /// Snapshot of the chat slots.
    #[must_use]
    pub fn chat(&self) -> ChatSession {
        read(&self.inner.chat).clone()
    }

    /// Read the chat slots without cloning them.
    pub fn read_chat<R>(&self, f: impl FnOnce(&ChatSession) -> R) -> R {
        f(&read(&self.inner.chat))
    }

    /// Mutate the chat slots under the session lock.
    pub fn update_chat<R>(&self, f: impl FnOnce(&mut ChatSession) -> R) -> R {
        let result = f(&mut write(&self.inner.chat));
        self.touch();
        result
    }

    fn touch(&self) {
        *write(&self.inner.last_activity) = Utc::now();
    }

    /// Check if the session has been idle longer than `timeout`.
    #[must_use]
    pub fn is_expired_with_timeout(&self, timeout: Duration) -> bool {
        let last = *read(&self.inner.last_activity);
        // A negative duration means clock skew; treat as fresh.
        (Utc::now() - last)
            .to_std()
            .is_ok_and(|idle| idle > timeout)
    }
}

/// Thread-safe store for sessions, keyed by session id.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    inner: Arc<RwLock<HashMap<String, Session>>>,
}

impl SessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session with a fresh random id.
    #[must_use]
    pub fn create(&self) -> Session {
        self.create_with_id(Uuid::new_v4().to_string())
    }

    #[must_use]
    pub fn create_with_id(&self, id: impl Into<String>) -> Session {
        let id = id.into();
        let session = Session::new(id.clone());
        write(&self.inner).insert(id, session.clone());
        session
    }

    /// Look up a session and mark it active.
    ///
    /// Unknown ids yield `None`; nothing is stored for them.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Session> {
        let session = read(&self.inner).get(id).cloned()?;
        session.touch();
        Some(session)
    }

    pub fn remove(&self, id: &str) -> Option<Session> {
        write(&self.inner).remove(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        read(&self.inner).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove sessions that have been inactive longer than the timeout.
    ///
    /// Returns the number of sessions removed.
    pub fn cleanup_expired_with_timeout(&self, timeout: Duration) -> usize {
        let mut guard = write(&self.inner);
        let before = guard.len();
        guard.retain(|_, session| !session.is_expired_with_timeout(timeout));
        before - guard.len()
    }
}
