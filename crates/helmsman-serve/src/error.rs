// ABOUTME: ApiError and its mapping to HTTP status codes and JSON error bodies.
// ABOUTME: The single place where auth and supervisor failures become responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use helmsman_auth::AuthError;
use helmsman_core::{ApiErrorKind, ErrorBody, LOGIN_PATH};
use helmsman_supervisor::SupervisorError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Supervisor(#[from] SupervisorError),

    #[error("bad request: {0}")]
    BadRequest(String),
}

impl ApiError {
    pub fn kind(&self) -> ApiErrorKind {
        match self {
            ApiError::Auth(AuthError::InvalidCredentials) => ApiErrorKind::InvalidCredentials,
            ApiError::Auth(AuthError::Unauthenticated) => ApiErrorKind::Unauthenticated,
            ApiError::Auth(AuthError::InvalidConfig(_)) => ApiErrorKind::Internal,
            ApiError::Supervisor(SupervisorError::AlreadyRunning(_)) => ApiErrorKind::AlreadyRunning,
            ApiError::Supervisor(SupervisorError::NotRunning(_)) => ApiErrorKind::NotRunning,
            ApiError::Supervisor(SupervisorError::SpawnError { .. }) => ApiErrorKind::SpawnError,
            ApiError::Supervisor(SupervisorError::LaunchTimeout { .. }) => {
                ApiErrorKind::LaunchTimeout
            }
            ApiError::BadRequest(_) => ApiErrorKind::BadRequest,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self.kind() {
            ApiErrorKind::InvalidCredentials | ApiErrorKind::Unauthenticated => {
                StatusCode::UNAUTHORIZED
            }
            ApiErrorKind::AlreadyRunning | ApiErrorKind::NotRunning => StatusCode::CONFLICT,
            ApiErrorKind::SpawnError | ApiErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            ApiErrorKind::LaunchTimeout => StatusCode::GATEWAY_TIMEOUT,
            ApiErrorKind::BadRequest => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let login = (status == StatusCode::UNAUTHORIZED).then(|| LOGIN_PATH.to_string());
        let body = ErrorBody {
            error: self.kind(),
            message: self.to_string(),
            login,
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use helmsman_core::RunMode;
    use std::time::Duration;

    #[test]
    fn test_status_codes() {
        let cases = [
            (ApiError::from(AuthError::InvalidCredentials), StatusCode::UNAUTHORIZED),
            (ApiError::from(AuthError::Unauthenticated), StatusCode::UNAUTHORIZED),
            (
                ApiError::from(SupervisorError::AlreadyRunning(RunMode::BotOnly)),
                StatusCode::CONFLICT,
            ),
            (
                ApiError::from(SupervisorError::NotRunning(RunMode::BotOnly)),
                StatusCode::CONFLICT,
            ),
            (
                ApiError::from(SupervisorError::LaunchTimeout {
                    mode: RunMode::Demo,
                    waited: Duration::from_secs(5),
                }),
                StatusCode::GATEWAY_TIMEOUT,
            ),
            (ApiError::BadRequest("x".into()), StatusCode::BAD_REQUEST),
        ];
        for (err, status) in cases {
            assert_eq!(err.status_code(), status, "{}", err);
        }
    }

    #[test]
    fn test_spawn_error_is_500_with_os_message() {
        let err = ApiError::from(SupervisorError::SpawnError {
            mode: RunMode::BotOnly,
            command: "python3 main.py".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "Permission denied"),
        });
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.kind(), ApiErrorKind::SpawnError);
        assert!(err.to_string().contains("Permission denied"));
    }
}
