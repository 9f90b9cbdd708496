// ABOUTME: Error types for process supervision.
// ABOUTME: Every variant names the run mode it concerns.

use helmsman_core::RunMode;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("{0} is already running")]
    AlreadyRunning(RunMode),

    #[error("{0} is not running")]
    NotRunning(RunMode),

    #[error("failed to launch {mode} ({command}): {source}")]
    SpawnError {
        mode: RunMode,
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{mode} did not exit within {waited:?} of being killed")]
    LaunchTimeout { mode: RunMode, waited: Duration },
}

impl SupervisorError {
    pub fn mode(&self) -> RunMode {
        match self {
            SupervisorError::AlreadyRunning(mode) | SupervisorError::NotRunning(mode) => *mode,
            SupervisorError::SpawnError { mode, .. } | SupervisorError::LaunchTimeout { mode, .. } => {
                *mode
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, SupervisorError>;
