//! Credential file loading.
//!
//! Two file layouts are accepted, both normalized into one mapping:
//!
//! ```yaml
//! users:
//!   bruno:
//!     name: Peter Parker
//!     password: $argon2id$v=19$...
//! ```
//!
//! or the positional layout, where the three lists are matched by index:
//!
//! ```yaml
//! usernames: [bruno, zsolt]
//! names: [Peter Parker, Rebecca Miller]
//! password_hashes: [$argon2id$..., $argon2id$...]
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("failed to read credential file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse credential file: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error(
        "credential lists differ in length: {usernames} usernames, {names} names, {hashes} password hashes"
    )]
    LengthMismatch {
        usernames: usize,
        names: usize,
        hashes: usize,
    },

    #[error("credential file defines no users")]
    NoUsers,

    #[error("blank username in credential file")]
    BlankUsername,

    #[error("duplicate username: {0}")]
    DuplicateUsername(String),

    #[error("user {0} has no display name")]
    BlankName(String),

    #[error("user {username} has an invalid password hash: {reason}")]
    InvalidHash { username: String, reason: String },

    #[error("failed to hash password: {0}")]
    Hash(String),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CredentialFile {
    Mapped {
        users: BTreeMap<String, MappedUser>,
    },
    Positional {
        usernames: Vec<String>,
        names: Vec<String>,
        password_hashes: Vec<String>,
    },
}

#[derive(Debug, Deserialize)]
struct MappedUser {
    name: String,
    password: String,
}

/// Display name and password hash of one user.
#[derive(Clone)]
pub struct CredentialRecord {
    pub display_name: String,
    password_hash: String,
}

impl fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("display_name", &self.display_name)
            .finish_non_exhaustive()
    }
}

impl CredentialRecord {
    /// Check `password` against the stored argon2 hash.
    #[must_use]
    pub fn verify(&self, password: &str) -> bool {
        verify_hash(&self.password_hash, password)
    }
}

/// Well-formed argon2id hash with the default parameters that no password matches.
const DECOY_HASH: &str = "$argon2id$v=19$m=19456,t=2,p=1$c29tZXNhbHRzb21lc2FsdA$AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";

fn verify_hash(phc: &str, password: &str) -> bool {
    PasswordHash::new(phc).is_ok_and(|hash| {
        Argon2::default()
            .verify_password(password.as_bytes(), &hash)
            .is_ok()
    })
}

/// Run a full argon2 verification that always fails.
///
/// Used for unknown usernames so a denial costs the same as a wrong password.
pub(crate) fn verify_decoy(password: &str) -> bool {
    verify_hash(DECOY_HASH, password)
}

/// Read-only mapping from username to [`CredentialRecord`].
#[derive(Debug, Clone)]
pub struct CredentialTable {
    users: BTreeMap<String, CredentialRecord>,
}

impl CredentialTable {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CredentialError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| CredentialError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&text)
    }

    pub fn from_yaml(text: &str) -> Result<Self, CredentialError> {
        match serde_yaml::from_str::<CredentialFile>(text)? {
            CredentialFile::Mapped { users } => Self::from_records(
                users
                    .into_iter()
                    .map(|(username, user)| (username, user.name, user.password)),
            ),
            CredentialFile::Positional {
                usernames,
                names,
                password_hashes,
            } => {
                if usernames.len() != names.len() || usernames.len() != password_hashes.len() {
                    return Err(CredentialError::LengthMismatch {
                        usernames: usernames.len(),
                        names: names.len(),
                        hashes: password_hashes.len(),
                    });
                }
                Self::from_records(
                    usernames
                        .into_iter()
                        .zip(names)
                        .zip(password_hashes)
                        .map(|((username, name), hash)| (username, name, hash)),
                )
            }
        }
    }

    /// Validate `(username, display name, password hash)` triples into a table.
    pub fn from_records<I>(records: I) -> Result<Self, CredentialError>
    where
        I: IntoIterator<Item = (String, String, String)>,
    {
        let mut users = BTreeMap::new();
        for (username, display_name, password_hash) in records {
            let username = username.trim().to_string();
            if username.is_empty() {
                return Err(CredentialError::BlankUsername);
            }
            if display_name.trim().is_empty() {
                return Err(CredentialError::BlankName(username));
            }
            if let Err(e) = PasswordHash::new(&password_hash) {
                return Err(CredentialError::InvalidHash {
                    username,
                    reason: e.to_string(),
                });
            }
            if users.contains_key(&username) {
                return Err(CredentialError::DuplicateUsername(username));
            }
            users.insert(
                username,
                CredentialRecord {
                    display_name,
                    password_hash,
                },
            );
        }

        if users.is_empty() {
            return Err(CredentialError::NoUsers);
        }
        Ok(Self { users })
    }

    #[must_use]
    pub fn get(&self, username: &str) -> Option<&CredentialRecord> {
        self.users.get(username)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.users.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

/// Hash a password into an argon2id PHC string with a random salt.
pub fn hash_password(password: &str) -> Result<String, CredentialError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| CredentialError::Hash(e.to_string()))
}
