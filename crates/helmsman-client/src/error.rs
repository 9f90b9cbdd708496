// ABOUTME: Error types for helmsman-client
// ABOUTME: Maps transport failures and API error bodies onto one enum

use helmsman_core::{ApiErrorKind, ErrorBody};
use thiserror::Error;

/// Errors that can occur talking to the Control API
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Not authenticated, run `helmsman login` first")]
    Unauthenticated,

    #[error("{0}")]
    AlreadyRunning(String),

    #[error("{0}")]
    NotRunning(String),

    #[error("Launch failed: {0}")]
    Spawn(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid server URL: {0}")]
    InvalidUrl(String),
}

impl ClientError {
    /// Build from a non-success status and its JSON error body.
    pub fn from_body(status: u16, body: ErrorBody) -> Self {
        match body.error {
            ApiErrorKind::InvalidCredentials => ClientError::InvalidCredentials,
            ApiErrorKind::Unauthenticated => ClientError::Unauthenticated,
            ApiErrorKind::AlreadyRunning => ClientError::AlreadyRunning(body.message),
            ApiErrorKind::NotRunning => ClientError::NotRunning(body.message),
            ApiErrorKind::SpawnError => ClientError::Spawn(body.message),
            ApiErrorKind::LaunchTimeout => ClientError::Timeout(body.message),
            ApiErrorKind::BadRequest | ApiErrorKind::Internal => ClientError::Api {
                status,
                message: body.message,
            },
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ClientError::Timeout(err.to_string())
        } else if err.is_decode() {
            ClientError::InvalidResponse(err.to_string())
        } else {
            ClientError::Connection(err.to_string())
        }
    }
}

impl From<url::ParseError> for ClientError {
    fn from(err: url::ParseError) -> Self {
        ClientError::InvalidUrl(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
