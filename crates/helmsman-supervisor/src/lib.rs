// ABOUTME: helmsman-supervisor library root.
// ABOUTME: Launches, stops and observes bot subprocesses, one per run mode.

mod error;
mod output;
mod process;
mod supervisor;

pub use error::{Result, SupervisorError};
pub use output::OutputBuffer;
pub use supervisor::{ProcessSupervisor, SupervisorOptions};
