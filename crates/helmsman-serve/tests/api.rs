// ABOUTME: Drives the Control API router in-process with tower's oneshot.
// ABOUTME: Covers the login gate, lifecycle routes and the error body mapping.

#![cfg(unix)]

use axum::body::Body;
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::Router;
use helmsman_auth::{Credential, CredentialStore, SessionManager, SessionSettings};
use helmsman_core::{ExpiryPolicy, ModeCatalogue, ModeOverride, RunMode};
use helmsman_serve::{router, AppState};
use helmsman_supervisor::{ProcessSupervisor, SupervisorOptions};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::time::Duration;
use tower::ServiceExt;

fn sleeper() -> ModeOverride {
    ModeOverride {
        program: Some("/bin/sh".to_string()),
        args: Some(vec!["-c".to_string(), "echo booted; exec sleep 30".to_string()]),
    }
}

fn test_app() -> (Router, AppState) {
    test_app_with(SessionSettings::default())
}

fn test_app_with(settings: SessionSettings) -> (Router, AppState) {
    let credentials = CredentialStore::new(Credential::new("admin", "admin123"), b"test".to_vec());
    let sessions = SessionManager::new(credentials, settings);

    let catalogue = ModeCatalogue::new("python3", std::env::temp_dir())
        .with_override(RunMode::BotOnly, sleeper())
        .with_override(RunMode::WebOnly, sleeper())
        .with_override(
            RunMode::Demo,
            ModeOverride {
                program: Some("/nonexistent/helmsman-demo".to_string()),
                args: None,
            },
        );
    let supervisor = ProcessSupervisor::new(
        catalogue,
        SupervisorOptions {
            stop_timeout: Duration::from_secs(2),
            kill_timeout: Duration::from_secs(2),
            startup_grace: Duration::from_millis(50),
            output_lines: 100,
        },
    );

    let state = AppState::new(sessions, supervisor);
    (router(state.clone()), state)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, HeaderMap, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, headers, body)
}

fn post(uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::post(uri).header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::get(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

async fn login(app: &Router) -> String {
    let (status, _, body) = send(
        app,
        post("/login", None, json!({"username": "admin", "password": "admin123"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body["token"].as_str().unwrap().to_string()
}

fn with_cookie(uri: &str, token: &str) -> Request<Body> {
    Request::get(uri)
        .header(header::COOKIE, format!("helmsman_session={}", token))
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn sliding_session_refreshes_cookie_on_use() {
    let (app, _) = test_app_with(SessionSettings {
        ttl: Duration::from_secs(600),
        expiry: ExpiryPolicy::Sliding,
    });
    let token = login(&app).await;

    for uri in ["/bot/status", "/api/modes", "/is-authenticated"] {
        let (status, headers, _) = send(&app, with_cookie(uri, &token)).await;
        assert_eq!(status, StatusCode::OK, "{}", uri);
        let cookie = headers.get(header::SET_COOKIE).unwrap().to_str().unwrap();
        assert!(cookie.starts_with(&format!("helmsman_session={};", token)));
        assert!(cookie.ends_with("Max-Age=600"), "{}", cookie);
    }

    // Bearer clients and rejected requests get no cookie
    let (_, headers, _) = send(&app, get("/bot/status", Some(&token))).await;
    assert!(headers.get(header::SET_COOKIE).is_none());
    let (status, headers, _) = send(&app, with_cookie("/bot/status", &"0".repeat(64))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(headers.get(header::SET_COOKIE).is_none());
}

#[tokio::test]
async fn fixed_session_leaves_cookie_alone() {
    let (app, _) = test_app();
    let token = login(&app).await;

    let (status, headers, _) = send(&app, with_cookie("/bot/status", &token)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(headers.get(header::SET_COOKIE).is_none());
}

#[tokio::test]
async fn oversized_ttl_login_caps_cookie() {
    let (app, _) = test_app_with(SessionSettings {
        ttl: Duration::from_secs(10_000_000_000_000),
        expiry: ExpiryPolicy::Sliding,
    });
    let (status, headers, _) = send(
        &app,
        post("/login", None, json!({"username": "admin", "password": "admin123"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let cookie = headers.get(header::SET_COOKIE).unwrap().to_str().unwrap();
    assert!(cookie.ends_with(&format!("Max-Age={}", helmsman_core::MAX_SESSION_TTL_SECS)));
}

#[tokio::test]
async fn login_with_defaults_sets_cookie_and_authenticates() {
    let (app, _) = test_app();
    let (status, headers, body) = send(
        &app,
        post("/login", None, json!({"username": "admin", "password": "admin123"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["authenticated"], true);
    assert_eq!(body["username"], "admin");
    let token = body["token"].as_str().unwrap();

    let cookie = headers.get(header::SET_COOKIE).unwrap().to_str().unwrap();
    assert!(cookie.starts_with(&format!("helmsman_session={};", token)));
    assert!(cookie.contains("HttpOnly"));

    // Browser path: the cookie alone authenticates
    let request = Request::get("/is-authenticated")
        .header(header::COOKIE, format!("helmsman_session={}", token))
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"authenticated": true}));
}

#[tokio::test]
async fn wrong_password_is_401_and_creates_no_session() {
    let (app, state) = test_app();
    let (status, headers, body) = send(
        &app,
        post("/login", None, json!({"username": "admin", "password": "wrong"})),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid_credentials");
    assert_eq!(body["login"], "/login");
    assert!(headers.get(header::SET_COOKIE).is_none());
    assert_eq!(state.sessions.session_count().await, 0);

    // Unknown user gets the identical answer
    let (_, _, other) = send(
        &app,
        post("/login", None, json!({"username": "root", "password": "admin123"})),
    )
    .await;
    assert_eq!(other, body);
}

#[tokio::test]
async fn is_authenticated_without_token_is_false() {
    let (app, _) = test_app();
    let (status, _, body) = send(&app, get("/is-authenticated", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"authenticated": false}));
}

#[tokio::test]
async fn bot_routes_require_a_session() {
    let (app, state) = test_app();

    let requests = vec![
        post("/bot/start", None, json!({"mode": "bot_only"})),
        post("/bot/stop", None, json!({"mode": "bot_only"})),
        post("/bot/restart", None, json!({"mode": "bot_only"})),
        get("/bot/status", None),
        get("/bot/logs?mode=bot_only", None),
        get("/modes", Some("ab".repeat(32).as_str())),
    ];
    for request in requests {
        let uri = request.uri().to_string();
        let (status, _, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{}", uri);
        assert_eq!(body["error"], "unauthenticated", "{}", uri);
        assert_eq!(body["login"], "/login", "{}", uri);
    }
    assert!(state.supervisor.status_all().await.is_empty());
}

#[tokio::test]
async fn start_twice_is_conflict_with_one_handle() {
    let (app, state) = test_app();
    let token = login(&app).await;

    let (status, _, handle) = send(
        &app,
        post(
            "/bot/start",
            Some(&token),
            json!({"mode": "bot_only", "args": {"pairs": 20, "testnet": true}}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(handle["mode"], "bot_only");
    assert_eq!(handle["status"], "starting");
    assert_eq!(handle["args"]["pairs"], 20);

    let (status, _, body) = send(&app, post("/bot/start", Some(&token), json!({"mode": "bot_only"}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "already_running");

    let (status, _, handles) = send(&app, get("/bot/status", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(handles.as_array().unwrap().len(), 1);
    assert_eq!(handles[0]["pid"], handle["pid"]);

    state.supervisor.shutdown().await;
}

#[tokio::test]
async fn stop_idle_mode_is_not_running() {
    let (app, _) = test_app();
    let token = login(&app).await;
    let (status, _, body) = send(&app, post("/bot/stop", Some(&token), json!({"mode": "web_only"}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "not_running");
}

#[tokio::test]
async fn stop_then_start_gives_fresh_handle() {
    let (app, state) = test_app();
    let token = login(&app).await;

    let (_, _, first) = send(&app, post("/bot/start", Some(&token), json!({"mode": "web_only"}))).await;
    let (status, _, ack) = send(&app, post("/bot/stop", Some(&token), json!({"mode": "web_only"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack["pid"], first["pid"]);
    assert_eq!(ack["forced"], false);

    let (status, _, second) = send(&app, post("/bot/start", Some(&token), json!({"mode": "web_only"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_ne!(second["pid"], first["pid"]);
    assert_ne!(second["started_at"], first["started_at"]);

    state.supervisor.shutdown().await;
}

#[tokio::test]
async fn status_for_one_mode() {
    let (app, state) = test_app();
    let token = login(&app).await;

    let (_, _, none) = send(&app, get("/bot/status?mode=bot_only", Some(&token))).await;
    assert_eq!(none, json!([]));

    send(&app, post("/bot/start", Some(&token), json!({"mode": "bot_only"}))).await;
    send(&app, post("/bot/start", Some(&token), json!({"mode": "web_only"}))).await;

    let (_, _, one) = send(&app, get("/bot/status?mode=web_only", Some(&token))).await;
    assert_eq!(one.as_array().unwrap().len(), 1);
    assert_eq!(one[0]["mode"], "web_only");

    let (status, _, body) = send(&app, get("/bot/status?mode=trading", Some(&token))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bad_request");

    state.supervisor.shutdown().await;
}

#[tokio::test]
async fn spawn_failure_is_500_with_os_message() {
    let (app, _) = test_app();
    let token = login(&app).await;
    let (status, _, body) = send(&app, post("/bot/start", Some(&token), json!({"mode": "demo"}))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "spawn_error");
    assert!(body["message"].as_str().unwrap().contains("/nonexistent/helmsman-demo"));
}

#[tokio::test]
async fn malformed_body_is_400() {
    let (app, _) = test_app();
    let token = login(&app).await;

    let (status, _, body) = send(&app, post("/bot/start", Some(&token), json!({"mode": 7}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bad_request");

    let request = Request::post("/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, _, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bad_request");
}

#[tokio::test]
async fn logout_is_idempotent_and_revokes() {
    let (app, _) = test_app();
    let token = login(&app).await;

    for _ in 0..2 {
        let (status, headers, body) = send(&app, post("/logout", Some(&token), json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"success": true}));
        let cookie = headers.get(header::SET_COOKIE).unwrap().to_str().unwrap();
        assert!(cookie.contains("Max-Age=0"));
    }

    let (status, _, _) = send(&app, post("/bot/start", Some(&token), json!({"mode": "bot_only"}))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _, _) = send(&app, post("/logout", None, json!({}))).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn second_login_revokes_first_token() {
    let (app, _) = test_app();
    let first = login(&app).await;
    let second = login(&app).await;

    let (_, _, body) = send(&app, get("/is-authenticated", Some(&first))).await;
    assert_eq!(body["authenticated"], false);
    let (_, _, body) = send(&app, get("/is-authenticated", Some(&second))).await;
    assert_eq!(body["authenticated"], true);
}

#[tokio::test]
async fn routes_are_mounted_under_api() {
    let (app, _) = test_app();
    let (status, _, body) = send(
        &app,
        post("/api/login", None, json!({"username": "admin", "password": "admin123"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["token"].as_str().unwrap();

    let (status, _, body) = send(&app, get("/api/is-authenticated", Some(token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["authenticated"], true);
}

#[tokio::test]
async fn modes_lists_catalogue() {
    let (app, _) = test_app();
    let token = login(&app).await;
    let (status, _, body) = send(&app, get("/modes", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);

    let modes = body.as_array().unwrap();
    assert_eq!(modes.len(), 6);
    assert_eq!(modes[0]["mode"], "interactive_menu");
    assert_eq!(modes[0]["menu_choice"], 1);
    assert_eq!(modes[3]["mode"], "bot_only");
    assert_eq!(modes[3]["accepts_bot_args"], true);
    assert_eq!(modes[3]["default_args"]["pairs"], 20);
    assert_eq!(modes[5]["command"], "python3 check_all.py");
}

#[tokio::test]
async fn logs_return_captured_output() {
    let (app, state) = test_app();
    let token = login(&app).await;
    send(&app, post("/bot/start", Some(&token), json!({"mode": "bot_only"}))).await;

    let mut lines = Value::Null;
    for _ in 0..100 {
        let (status, _, body) = send(&app, get("/bot/logs?mode=bot_only&lines=5", Some(&token))).await;
        assert_eq!(status, StatusCode::OK);
        if !body["lines"].as_array().unwrap().is_empty() {
            lines = body["lines"].clone();
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(lines, json!(["booted"]));

    state.supervisor.shutdown().await;
}
