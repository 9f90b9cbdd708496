// ABOUTME: Runs the real Control API on an ephemeral port and drives it with ControlClient.
// ABOUTME: Walks the operator scenarios: login, launch, crash, relaunch, logout.

#![cfg(unix)]

use helmsman_auth::{Credential, CredentialStore, SessionManager, SessionSettings};
use helmsman_client::{ClientError, ControlClient};
use helmsman_core::{BotArgs, ModeCatalogue, ModeOverride, ProcessStatus, RunMode};
use helmsman_serve::{router, AppState};
use helmsman_supervisor::{ProcessSupervisor, SupervisorOptions};
use std::time::Duration;

async fn spawn_server() -> (String, AppState) {
    let credentials = CredentialStore::new(Credential::new("admin", "admin123"), b"e2e".to_vec());
    let sessions = SessionManager::new(credentials, SessionSettings::default());

    let sleeper = ModeOverride {
        program: Some("/bin/sh".to_string()),
        args: Some(vec!["-c".to_string(), "exec sleep 30".to_string()]),
    };
    let catalogue = ModeCatalogue::new("python3", std::env::temp_dir())
        .with_override(RunMode::BotOnly, sleeper.clone())
        .with_override(RunMode::WebOnly, sleeper);
    let supervisor = ProcessSupervisor::new(
        catalogue,
        SupervisorOptions {
            stop_timeout: Duration::from_secs(2),
            kill_timeout: Duration::from_secs(2),
            startup_grace: Duration::from_millis(100),
            output_lines: 50,
        },
    );

    let state = AppState::new(sessions, supervisor);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = router(state.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}", addr), state)
}

#[tokio::test]
async fn login_and_session_check() {
    let (server, _state) = spawn_server().await;
    let mut client = ControlClient::new(&server).unwrap();

    assert!(!client.is_authenticated().await.unwrap());

    let err = client.login("admin", "wrong").await.unwrap_err();
    assert!(matches!(err, ClientError::InvalidCredentials));
    assert!(client.token().is_none());

    let session = client.login("admin", "admin123").await.unwrap();
    assert!(session.authenticated);
    assert!(client.is_authenticated().await.unwrap());

    client.logout().await.unwrap();
    assert!(client.token().is_none());

    // The revoked token stays revoked
    let stale = ControlClient::new(&server).unwrap().with_token(session.token);
    assert!(!stale.is_authenticated().await.unwrap());
    assert!(matches!(
        stale.status_all().await.unwrap_err(),
        ClientError::Unauthenticated
    ));
}

#[tokio::test]
async fn bot_lifecycle_with_external_crash() {
    let (server, state) = spawn_server().await;
    let mut client = ControlClient::new(&server).unwrap();
    client.login("admin", "admin123").await.unwrap();

    let args = BotArgs {
        pairs: Some(20),
        testnet: Some(true),
        interval_secs: None,
    };
    let handle = client.start(RunMode::BotOnly, &args).await.unwrap();
    assert_eq!(handle.status, ProcessStatus::Starting);

    let err = client.start(RunMode::BotOnly, &args).await.unwrap_err();
    assert!(matches!(err, ClientError::AlreadyRunning(_)));

    tokio::time::sleep(Duration::from_millis(200)).await;
    let running = client.status(RunMode::BotOnly).await.unwrap().unwrap();
    assert_eq!(running.status, ProcessStatus::Running);

    kill_externally(handle.pid);

    let mut crashed = None;
    for _ in 0..100 {
        let current = client.status(RunMode::BotOnly).await.unwrap().unwrap();
        if !current.is_live() {
            crashed = Some(current);
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    let crashed = crashed.expect("process never observed as gone");
    assert_eq!(crashed.status, ProcessStatus::Crashed);
    assert_eq!(crashed.last_exit_code, Some(137));

    let again = client.start(RunMode::BotOnly, &args).await.unwrap();
    assert_ne!(again.pid, handle.pid);

    let ack = client.stop(RunMode::BotOnly, true).await.unwrap();
    assert_eq!(ack.pid, again.pid);

    let err = client.stop(RunMode::BotOnly, true).await.unwrap_err();
    assert!(matches!(err, ClientError::NotRunning(_)));

    assert!(client.status(RunMode::WebOnly).await.unwrap().is_none());
    assert_eq!(client.modes().await.unwrap().len(), 6);

    state.supervisor.shutdown().await;
}

fn kill_externally(pid: u32) {
    let status = std::process::Command::new("kill")
        .arg("-KILL")
        .arg(pid.to_string())
        .status()
        .unwrap();
    assert!(status.success());
}
