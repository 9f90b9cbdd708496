// ABOUTME: Shared types and configuration for helmsman.
// ABOUTME: Contains config parsing, the run mode catalogue, and Control API wire types.

pub mod api;
pub mod config;
pub mod handle;
pub mod mode;

pub use api::{
    ApiErrorKind, AuthStatus, ErrorBody, LoginRequest, LoginResponse, LogoutResponse, LogsQuery,
    LogsResponse, ModeInfo, StartRequest, StatusQuery, StopRequest, LOGIN_PATH, SESSION_COOKIE,
};
pub use config::{
    AuthSettings, Config, ExpiryPolicy, ModeOverride, ServerSettings, SupervisorSettings,
    MAX_SESSION_TTL_SECS,
};
pub use handle::{CompanionProcess, ProcessHandle, ProcessStatus, StopAck};
pub use mode::{BotArgs, CommandLine, ModeCatalogue, ParseModeError, ResolvedCommand, RunMode};
