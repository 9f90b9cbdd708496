// ABOUTME: Request and response bodies for the Control API.
// ABOUTME: Shared by the axum server and the reqwest dashboard client.

use crate::mode::{BotArgs, RunMode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Name of the cookie carrying the session token.
pub const SESSION_COOKIE: &str = "helmsman_session";

/// Where unauthenticated callers are sent.
pub const LOGIN_PATH: &str = "/login";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub authenticated: bool,
    pub username: String,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthStatus {
    pub authenticated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogoutResponse {
    pub success: bool,
}

/// Body of `POST /bot/start` and `POST /bot/restart`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartRequest {
    pub mode: RunMode,
    #[serde(default)]
    pub args: BotArgs,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopRequest {
    pub mode: RunMode,
    #[serde(default = "default_graceful")]
    pub graceful: bool,
}

fn default_graceful() -> bool {
    true
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusQuery {
    #[serde(default)]
    pub mode: Option<RunMode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogsQuery {
    pub mode: RunMode,
    #[serde(default)]
    pub lines: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogsResponse {
    pub mode: RunMode,
    pub lines: Vec<String>,
}

/// One entry of `GET /modes`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModeInfo {
    pub mode: RunMode,
    pub description: String,
    pub menu_choice: usize,
    pub command: String,
    /// Web command launched alongside `command`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub companion: Option<String>,
    pub accepts_bot_args: bool,
    #[serde(default)]
    pub default_args: BotArgs,
}

/// Machine-readable error category carried in every error body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiErrorKind {
    InvalidCredentials,
    Unauthenticated,
    AlreadyRunning,
    NotRunning,
    SpawnError,
    LaunchTimeout,
    BadRequest,
    Internal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ApiErrorKind,
    pub message: String,
    /// Login page to redirect to, present on 401 responses
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login: Option<String>,
}
