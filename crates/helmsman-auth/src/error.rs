// ABOUTME: Error types for authentication using thiserror.
// ABOUTME: Login failures never say which field was wrong.

use thiserror::Error;

/// Errors returned by the credential store and session manager.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Username or password did not match. Deliberately says nothing more.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Token absent, malformed, expired, revoked or never issued.
    #[error("not authenticated")]
    Unauthenticated,

    /// The configured credential could not be loaded.
    #[error("invalid credential configuration: {0}")]
    InvalidConfig(String),
}

/// Result type alias using AuthError.
pub type Result<T> = std::result::Result<T, AuthError>;
