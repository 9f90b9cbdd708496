// ABOUTME: Shared logging setup for the helmsman server and CLI
// ABOUTME: init() for stderr, init_file() for the interactive menu, init_for() for one-shot commands

use std::fs::File;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

type InitError = Box<dyn std::error::Error + Send + Sync>;

/// Standard logging to stderr. Default: INFO level, RUST_LOG override.
/// Used by `helmsman serve`.
pub fn init() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();
}

/// File logging for the interactive menu so prompts stay readable.
/// Logs to ~/.config/helmsman/{app_name}/{app_name}.log at WARN, RUST_LOG override.
pub fn init_file(app_name: &str) {
    match log_dir(app_name) {
        Some(dir) => init_file_in(&dir, app_name),
        None => eprintln!("Warning: failed to set up file logging: no config directory"),
    }
}

/// Like `init_file`, writing under `dir`. A failure is reported on stderr
/// and the caller carries on without logging.
pub fn init_file_in(dir: &Path, app_name: &str) {
    if let Err(e) = try_init_file(dir, app_name) {
        eprintln!("Warning: failed to set up file logging: {e}");
    }
}

/// Directory holding the log file for `app_name`.
pub fn log_dir(app_name: &str) -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("helmsman").join(app_name))
}

/// Open `{dir}/{app_name}.log` for appending, creating `dir` as needed.
fn open_log_file(dir: &Path, app_name: &str) -> std::io::Result<File> {
    std::fs::create_dir_all(dir)?;
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join(format!("{app_name}.log")))
}

fn try_init_file(dir: &Path, app_name: &str) -> Result<(), InitError> {
    let log_file = open_log_file(dir, app_name)?;
    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into()))
        .with_ansi(false)
        .try_init()
}

/// Crate-filtered logging to stderr. Default: INFO for named crate, WARN for everything else.
/// Used by the one-shot CLI commands.
pub fn init_for(crate_name: &str) {
    let directive = format!("{crate_name}=info");
    let filter = EnvFilter::from_default_env()
        .add_directive(tracing::Level::WARN.into())
        .add_directive(
            directive
                .parse()
                .unwrap_or_else(|_| tracing::Level::INFO.into()),
        );

    tracing_subscriber::fmt().with_env_filter(filter).init();
}
