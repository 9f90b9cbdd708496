// ABOUTME: Route table for the Control API.
// ABOUTME: Login and logout are public; the other routes carry the session and refresh its cookie.

pub mod auth;
pub mod bot;

use crate::state::AppState;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

fn routes(state: &AppState) -> Router<AppState> {
    let session_routes = Router::new()
        .route("/is-authenticated", get(auth::is_authenticated))
        .route("/bot/start", post(bot::start))
        .route("/bot/stop", post(bot::stop))
        .route("/bot/restart", post(bot::restart))
        .route("/bot/status", get(bot::status))
        .route("/bot/logs", get(bot::logs))
        .route("/modes", get(bot::modes))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::refresh_session_cookie,
        ));

    Router::new()
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .merge(session_routes)
}

/// Build the full router. Every route is served at the root and under `/api`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(routes(&state))
        .nest("/api", routes(&state))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
