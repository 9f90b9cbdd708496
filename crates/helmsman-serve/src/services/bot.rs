// ABOUTME: Bot lifecycle handlers: start, stop, restart, status, logs and the mode list.
// ABOUTME: Each handler authenticates before the request body is even parsed.

use super::auth::Authenticated;
use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::Json;
use helmsman_core::{
    LogsQuery, LogsResponse, ModeInfo, ProcessHandle, RunMode, StartRequest, StatusQuery, StopAck,
    StopRequest,
};
use tracing::info;

/// Lines returned by `GET /bot/logs` when `lines` is not given.
const DEFAULT_LOG_LINES: usize = 100;

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(value)| value)
        .map_err(|e| ApiError::BadRequest(e.body_text()))
}

fn query<T>(params: Result<Query<T>, QueryRejection>) -> Result<T, ApiError> {
    params
        .map(|Query(value)| value)
        .map_err(|e| ApiError::BadRequest(e.body_text()))
}

/// `POST /bot/start`
pub async fn start(
    State(state): State<AppState>,
    Authenticated(session): Authenticated,
    payload: Result<Json<StartRequest>, JsonRejection>,
) -> Result<Json<ProcessHandle>, ApiError> {
    let request = body(payload)?;
    info!(username = %session.username, mode = %request.mode, "Start requested");
    let handle = state.supervisor.start(request.mode, &request.args).await?;
    Ok(Json(handle))
}

/// `POST /bot/stop`
pub async fn stop(
    State(state): State<AppState>,
    Authenticated(session): Authenticated,
    payload: Result<Json<StopRequest>, JsonRejection>,
) -> Result<Json<StopAck>, ApiError> {
    let request = body(payload)?;
    info!(
        username = %session.username,
        mode = %request.mode,
        graceful = request.graceful,
        "Stop requested"
    );
    let ack = state.supervisor.stop(request.mode, request.graceful).await?;
    Ok(Json(ack))
}

/// `POST /bot/restart`
pub async fn restart(
    State(state): State<AppState>,
    Authenticated(session): Authenticated,
    payload: Result<Json<StartRequest>, JsonRejection>,
) -> Result<Json<ProcessHandle>, ApiError> {
    let request = body(payload)?;
    info!(username = %session.username, mode = %request.mode, "Restart requested");
    let handle = state.supervisor.restart(request.mode, &request.args).await?;
    Ok(Json(handle))
}

/// `GET /bot/status[?mode=]`: every launched mode, or just the one asked for.
/// A mode that was never launched yields an empty list.
pub async fn status(
    State(state): State<AppState>,
    Authenticated(_): Authenticated,
    params: Result<Query<StatusQuery>, QueryRejection>,
) -> Result<Json<Vec<ProcessHandle>>, ApiError> {
    let handles = match query(params)?.mode {
        Some(mode) => state.supervisor.status(mode).await.into_iter().collect(),
        None => state.supervisor.status_all().await,
    };
    Ok(Json(handles))
}

/// `GET /bot/logs?mode=&lines=`
pub async fn logs(
    State(state): State<AppState>,
    Authenticated(_): Authenticated,
    params: Result<Query<LogsQuery>, QueryRejection>,
) -> Result<Json<LogsResponse>, ApiError> {
    let params = query(params)?;
    let lines = state
        .supervisor
        .logs(params.mode, params.lines.unwrap_or(DEFAULT_LOG_LINES))
        .await;
    Ok(Json(LogsResponse {
        mode: params.mode,
        lines,
    }))
}

/// `GET /modes`: the catalogue with each mode's default command line.
pub async fn modes(
    State(state): State<AppState>,
    Authenticated(_): Authenticated,
) -> Json<Vec<ModeInfo>> {
    let catalogue = state.supervisor.catalogue();
    let modes = RunMode::ALL
        .into_iter()
        .map(|mode| {
            let default_args = mode.default_args().unwrap_or_default();
            let resolved = catalogue.resolve(mode, &Default::default());
            ModeInfo {
                mode,
                description: mode.description().to_string(),
                menu_choice: mode.menu_choice(),
                command: resolved.command.to_string(),
                companion: resolved.companion.map(|c| c.to_string()),
                accepts_bot_args: mode.accepts_bot_args(),
                default_args,
            }
        })
        .collect();
    Json(modes)
}
