// ABOUTME: Login, logout and session check handlers, the Authenticated extractor and cookie refresh.
// ABOUTME: Tokens arrive as the session cookie or an Authorization: Bearer header.

use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequestParts, Request, State};
use axum::http::header::{AUTHORIZATION, COOKIE, SET_COOKIE};
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use helmsman_auth::Session;
use helmsman_core::{
    AuthStatus, ExpiryPolicy, LoginRequest, LoginResponse, LogoutResponse, SESSION_COOKIE,
};
use std::time::Duration;
use tracing::debug;

/// Session token carried by the request, bearer header first.
pub fn session_token(headers: &HeaderMap) -> Option<&str> {
    bearer_token(headers).or_else(|| cookie_token(headers))
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
}

fn cookie_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value)
}

fn session_cookie(token: &str, max_age_secs: u64) -> String {
    format!(
        "{}={}; HttpOnly; SameSite=Strict; Path=/; Max-Age={}",
        SESSION_COOKIE, token, max_age_secs
    )
}

/// Whole seconds left, rounded up so a fresh session reports its full TTL.
fn max_age_secs(remaining: Duration) -> u64 {
    remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0)
}

fn expired_cookie() -> String {
    format!(
        "{}=; HttpOnly; SameSite=Strict; Path=/; Max-Age=0",
        SESSION_COOKIE
    )
}

/// A request that carried a valid session. Rejects with 401 otherwise.
pub struct Authenticated(pub Session);

#[axum::async_trait]
impl FromRequestParts<AppState> for Authenticated {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let session = state.sessions.validate(session_token(&parts.headers)).await?;
        Ok(Authenticated(session))
    }
}

/// `POST /login`
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let session = state
        .sessions
        .login(&request.username, &request.password)
        .await?;

    let cookie = session_cookie(
        &session.token,
        state.sessions.settings().effective_ttl().as_secs(),
    );
    let body = LoginResponse {
        authenticated: true,
        username: session.username,
        token: session.token,
        expires_at: session.expires_at,
    };
    Ok(([(SET_COOKIE, cookie)], Json(body)).into_response())
}

/// `POST /logout`: always succeeds, whatever the state of the presented token.
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    state.sessions.logout(session_token(&headers)).await;
    (
        [(SET_COOKIE, expired_cookie())],
        Json(LogoutResponse { success: true }),
    )
        .into_response()
}

/// `GET /is-authenticated`
pub async fn is_authenticated(State(state): State<AppState>, headers: HeaderMap) -> Json<AuthStatus> {
    let authenticated = match state.sessions.validate(session_token(&headers)).await {
        Ok(session) => {
            debug!(username = %session.username, "Session check passed");
            true
        }
        Err(_) => false,
    };
    Json(AuthStatus { authenticated })
}

/// Re-issue the session cookie with its extended Max-Age under sliding
/// expiry, so the browser keeps the cookie as long as the server keeps the
/// session. Bearer clients manage their own token and get no cookie.
pub async fn refresh_session_cookie(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let token = match bearer_token(request.headers()) {
        Some(_) => None,
        None => cookie_token(request.headers()).map(str::to_string),
    };
    let mut response = next.run(request).await;

    if state.sessions.settings().expiry != ExpiryPolicy::Sliding {
        return response;
    }
    let Some(token) = token else {
        return response;
    };
    if let Some(remaining) = state.sessions.remaining(Some(&token)).await {
        match HeaderValue::from_str(&session_cookie(&token, max_age_secs(remaining))) {
            Ok(cookie) => {
                response.headers_mut().append(SET_COOKIE, cookie);
            }
            Err(e) => debug!(error = %e, "Session cookie not refreshed"),
        }
    }
    response
}
