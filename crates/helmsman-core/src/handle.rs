// ABOUTME: Supervisor's record of one launched subprocess and its lifecycle state.
// ABOUTME: Serialized as-is by the Control API status endpoints.

use crate::mode::{BotArgs, RunMode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessStatus {
    Starting,
    Running,
    /// A stop request is waiting for the process to exit
    Stopping,
    Stopped,
    Crashed,
}

impl ProcessStatus {
    /// Starting, Running and Stopping all count as a live process for the mode.
    pub fn is_live(&self) -> bool {
        matches!(
            self,
            ProcessStatus::Starting | ProcessStatus::Running | ProcessStatus::Stopping
        )
    }
}

impl fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProcessStatus::Starting => "starting",
            ProcessStatus::Running => "running",
            ProcessStatus::Stopping => "stopping",
            ProcessStatus::Stopped => "stopped",
            ProcessStatus::Crashed => "crashed",
        };
        f.write_str(s)
    }
}

/// Snapshot of a launched subprocess.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessHandle {
    pub mode: RunMode,
    pub pid: u32,
    pub started_at: DateTime<Utc>,
    pub status: ProcessStatus,
    pub last_exit_code: Option<i32>,
    /// When the process was observed gone, if it is
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    /// Rendered command line the process was started with
    pub command: String,
    /// Effective bot arguments after merging over mode defaults
    #[serde(default)]
    pub args: BotArgs,
    /// Web process running alongside the main one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub companion: Option<CompanionProcess>,
}

/// Identity of a companion process. It lives and dies with its handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanionProcess {
    pub pid: u32,
    pub command: String,
}

impl ProcessHandle {
    pub fn is_live(&self) -> bool {
        self.status.is_live()
    }
}

/// Acknowledgement returned by a stop request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopAck {
    pub mode: RunMode,
    pub pid: u32,
    pub exit_code: Option<i32>,
    /// True when the graceful window elapsed (or was skipped) and the process was killed
    pub forced: bool,
}
