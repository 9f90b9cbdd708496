// ABOUTME: OS-level helpers: spawning a mode's command, signalling it, reading its exit.
// ABOUTME: Unix children get their own process group so signals reach their descendants.

use helmsman_core::CommandLine;
use std::process::{ExitStatus, Stdio};
use tokio::process::{Child, Command};

/// Spawn `command` with piped output, detached stdin and `kill_on_drop`.
pub fn spawn(command: &CommandLine) -> std::io::Result<Child> {
    let mut cmd = Command::new(&command.program);
    cmd.args(&command.args)
        .current_dir(&command.working_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    #[cfg(unix)]
    cmd.process_group(0);

    cmd.spawn()
}

/// Ask the process (group) to terminate.
///
/// Returns false if the process was already gone.
#[cfg(unix)]
pub fn terminate(child: &mut Child, pid: u32) -> bool {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return child.start_kill().is_ok();
    };
    // SAFETY: kill(2) with a negative pid signals the group created by process_group(0).
    let rc = unsafe { libc::kill(-pid, libc::SIGTERM) };
    if rc == 0 {
        return true;
    }
    let err = std::io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::ESRCH) {
        return false;
    }
    tracing::warn!(pid = pid, error = %err, "SIGTERM to process group failed, signalling child");
    // SAFETY: as above, targeting the child alone.
    unsafe { libc::kill(pid, libc::SIGTERM) == 0 }
}

#[cfg(not(unix))]
pub fn terminate(child: &mut Child, _pid: u32) -> bool {
    child.start_kill().is_ok()
}

/// Forcefully kill the process (group).
pub fn kill(child: &mut Child, pid: u32) {
    #[cfg(unix)]
    if let Ok(pid) = libc::pid_t::try_from(pid) {
        // SAFETY: kill(2) on the child's own process group.
        unsafe {
            libc::kill(-pid, libc::SIGKILL);
        }
    }
    let _ = pid;
    if let Err(e) = child.start_kill() {
        tracing::debug!(error = %e, "start_kill after SIGKILL");
    }
}

/// Exit code of a finished process; death by signal N is reported as 128 + N.
pub fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    -1
}
