// ABOUTME: HTTP server setup and lifecycle for the Control API
// ABOUTME: Runs the liveness monitor and session purger alongside axum, stops bots on exit

use crate::services::router;
use crate::state::AppState;
use crate::ServeConfig;
use anyhow::{Context, Result};
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// How often expired sessions are dropped from memory
const SESSION_PURGE_INTERVAL: Duration = Duration::from_secs(60);

/// Run the Control API server
pub async fn run(config: ServeConfig) -> Result<()> {
    let addr = config.listen_addr();
    let settings = &config.settings;

    info!("Starting helmsman control server");
    info!("  Address: {}", addr);
    info!("  Bot directory: {}", settings.supervisor.bot_dir_expanded().display());
    info!("  Interpreter: {}", settings.supervisor.interpreter);

    let state = AppState::from_config(settings)?;
    let cancel = CancellationToken::new();

    let monitor = state
        .supervisor
        .spawn_liveness_monitor(settings.supervisor.poll_interval(), cancel.clone());
    let purger = spawn_session_purger(&state, cancel.clone());

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;

    info!("Control API listening on {}", addr);
    println!();
    println!("helmsman control server running!");
    println!("  Dashboard API: http://{}", addr);
    println!("  Login: {}", settings.auth.username);
    if settings.auth.password_sha256.is_none() && settings.auth.password == "admin123" {
        println!("  Password: admin123 (default, set ADMIN_PASSWORD to change)");
    }
    println!();
    println!("Press Ctrl+C to stop");

    let served = axum::serve(listener, router(state.clone()))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("running HTTP server");

    cancel.cancel();
    if let Err(e) = monitor.await {
        error!("Liveness monitor task failed: {}", e);
    }
    if let Err(e) = purger.await {
        error!("Session purge task failed: {}", e);
    }

    info!("Stopping supervised processes");
    state.supervisor.shutdown().await;

    served?;
    info!("Server shut down gracefully");
    println!("\nServer stopped.");

    Ok(())
}

fn spawn_session_purger(state: &AppState, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
    let sessions = state.sessions.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SESSION_PURGE_INTERVAL);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    sessions.purge_expired().await;
                }
            }
        }
    })
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down...");
        }
    }
}
