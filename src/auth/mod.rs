//! Authentication.
//!
//! - [`CredentialTable`]: username to credential record mapping, loaded once
//!   from a YAML file and validated at load time
//! - [`AuthGate`]: checks a username/password pair and reports a [`LoginOutcome`]

mod credentials;
mod gate;

pub use credentials::{CredentialError, CredentialRecord, CredentialTable, hash_password};
pub use gate::{AuthGate, AuthenticatedUser, LoginOutcome};
