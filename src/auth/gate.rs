use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::CredentialTable;
use super::credentials::verify_decoy;
use crate::session::Session;

/// A user who passed the gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    pub username: String,
    pub display_name: String,
}

/// Result of a login attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    /// Credentials matched.
    Granted(AuthenticatedUser),
    /// Unknown user or wrong password.
    Denied,
    /// Username or password left blank; nothing was checked.
    Pending,
}

/// Login gate over the credential table.
#[derive(Debug, Clone)]
pub struct AuthGate {
    credentials: Arc<CredentialTable>,
}

impl AuthGate {
    #[must_use]
    pub fn new(credentials: Arc<CredentialTable>) -> Self {
        Self { credentials }
    }

    /// Check a username/password pair.
    ///
    /// Password verification is CPU-bound; call from a blocking task.
    #[must_use]
    pub fn login(&self, username: &str, password: &str) -> LoginOutcome {
        let username = username.trim();
        if username.is_empty() || password.is_empty() {
            return LoginOutcome::Pending;
        }

        match self.credentials.get(username) {
            Some(record) if record.verify(password) => {
                info!(name: "auth.login.granted", username = %username, "Login granted");
                LoginOutcome::Granted(AuthenticatedUser {
                    username: username.to_string(),
                    display_name: record.display_name.clone(),
                })
            }
            Some(_) => {
                warn!(name: "auth.login.denied", username = %username, reason = "password", "Login denied");
                LoginOutcome::Denied
            }
            None => {
                std::hint::black_box(verify_decoy(password));
                warn!(name: "auth.login.denied", username = %username, reason = "unknown_user", "Login denied");
                LoginOutcome::Denied
            }
        }
    }

    /// Sign the session out. Thread and messages are cleared with it.
    pub fn logout(&self, session: &Session) {
        if let Some(user) = session.user() {
            info!(name: "auth.logout", username = %user.username, session_id = %session.id(), "Logged out");
        }
        session.sign_out();
    }
}
