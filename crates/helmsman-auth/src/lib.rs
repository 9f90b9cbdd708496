// ABOUTME: Authentication for the helmsman control plane.
// ABOUTME: Single-operator credential store plus issue/validate/revoke of session tokens.

pub mod credentials;
pub mod error;
pub mod session;

pub use credentials::{constant_time_eq, Credential, CredentialStore};
pub use error::{AuthError, Result};
pub use session::{Session, SessionManager, SessionSettings};
