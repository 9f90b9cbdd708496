// ABOUTME: ProcessSupervisor: start, stop, restart and observe one child per run mode.
// ABOUTME: Each mode has its own lock; the liveness monitor never waits on a busy mode.

use crate::error::{Result, SupervisorError};
use crate::output::OutputBuffer;
use crate::process;
use chrono::Utc;
use helmsman_core::{
    BotArgs, CommandLine, CompanionProcess, ModeCatalogue, ProcessHandle, ProcessStatus, RunMode,
    StopAck, SupervisorSettings,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::process::Child;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Timing and capture limits for supervised children.
#[derive(Debug, Clone, Copy)]
pub struct SupervisorOptions {
    pub stop_timeout: Duration,
    pub kill_timeout: Duration,
    pub startup_grace: Duration,
    pub output_lines: usize,
}

impl Default for SupervisorOptions {
    fn default() -> Self {
        Self::from(&SupervisorSettings::default())
    }
}

impl From<&SupervisorSettings> for SupervisorOptions {
    fn from(settings: &SupervisorSettings) -> Self {
        Self {
            stop_timeout: settings.stop_timeout(),
            kill_timeout: settings.kill_timeout(),
            startup_grace: settings.startup_grace(),
            output_lines: settings.output_lines,
        }
    }
}

/// Outcome of signalling one child and waiting for it.
enum Halt {
    Exited { exit_code: Option<i32>, forced: bool },
    Unreaped,
}

/// Everything the supervisor knows about one mode.
struct Slot {
    handle: Option<ProcessHandle>,
    child: Option<Child>,
    companion: Option<Child>,
    spawned_at: Option<Instant>,
    output: OutputBuffer,
}

impl Slot {
    fn new(output_lines: usize) -> Self {
        Self {
            handle: None,
            child: None,
            companion: None,
            spawned_at: None,
            output: OutputBuffer::new(output_lines),
        }
    }

    fn is_live(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| h.is_live())
    }

    /// Bring the handle up to date with the OS view of the children.
    fn refresh(&mut self, startup_grace: Duration) {
        let Some(child) = self.child.as_mut() else {
            return;
        };
        let Some(handle) = self.handle.as_mut() else {
            return;
        };

        let web_pid = handle.companion.as_ref().map(|c| c.pid).unwrap_or_default();
        if let Some(web) = self.companion.as_mut() {
            if let Ok(Some(status)) = web.try_wait() {
                warn!(
                    mode = %handle.mode,
                    pid = web_pid,
                    exit_code = process::exit_code(status),
                    "Web companion exited"
                );
                self.companion = None;
            }
        }

        match child.try_wait() {
            Ok(Some(status)) => {
                let code = process::exit_code(status);
                handle.last_exit_code = Some(code);
                handle.ended_at = Some(Utc::now());
                handle.status = if code == 0 {
                    ProcessStatus::Stopped
                } else {
                    ProcessStatus::Crashed
                };
                if handle.status == ProcessStatus::Crashed {
                    warn!(mode = %handle.mode, pid = handle.pid, exit_code = code, "Process crashed");
                } else {
                    info!(mode = %handle.mode, pid = handle.pid, exit_code = code, "Process exited");
                }
                self.child = None;

                // The web side never outlives the bot
                if let Some(mut web) = self.companion.take() {
                    process::kill(&mut web, web_pid);
                    tokio::spawn(async move {
                        let _ = web.wait().await;
                    });
                }
            }
            Ok(None) => {
                let settled = self
                    .spawned_at
                    .is_some_and(|at| at.elapsed() >= startup_grace);
                if handle.status == ProcessStatus::Starting && settled {
                    debug!(mode = %handle.mode, pid = handle.pid, "Process running");
                    handle.status = ProcessStatus::Running;
                }
            }
            Err(e) => {
                warn!(mode = %handle.mode, pid = handle.pid, error = %e, "Liveness check failed");
            }
        }
    }
}

/// SIGTERM (when `graceful`) then SIGKILL, each bounded by its timeout.
async fn halt(
    options: SupervisorOptions,
    mode: RunMode,
    child: &mut Child,
    pid: u32,
    graceful: bool,
) -> Halt {
    if graceful && process::terminate(child, pid) {
        debug!(mode = %mode, pid = pid, "Sent SIGTERM");
        if let Ok(Ok(status)) = tokio::time::timeout(options.stop_timeout, child.wait()).await {
            return Halt::Exited {
                exit_code: Some(process::exit_code(status)),
                forced: false,
            };
        }
        warn!(mode = %mode, pid = pid, "Graceful stop timed out, killing");
    }

    process::kill(child, pid);
    match tokio::time::timeout(options.kill_timeout, child.wait()).await {
        Ok(Ok(status)) => Halt::Exited {
            exit_code: Some(process::exit_code(status)),
            forced: true,
        },
        Ok(Err(e)) => {
            warn!(mode = %mode, pid = pid, error = %e, "Failed to reap killed process");
            Halt::Exited {
                exit_code: None,
                forced: true,
            }
        }
        Err(_) => {
            error!(mode = %mode, pid = pid, "Killed process was not reaped");
            Halt::Unreaped
        }
    }
}

/// Owns every bot subprocess. At most one live process exists per mode.
pub struct ProcessSupervisor {
    catalogue: ModeCatalogue,
    options: SupervisorOptions,
    slots: HashMap<RunMode, Arc<Mutex<Slot>>>,
}

impl ProcessSupervisor {
    pub fn new(catalogue: ModeCatalogue, options: SupervisorOptions) -> Self {
        let slots = RunMode::ALL
            .into_iter()
            .map(|mode| (mode, Arc::new(Mutex::new(Slot::new(options.output_lines)))))
            .collect();
        Self {
            catalogue,
            options,
            slots,
        }
    }

    pub fn catalogue(&self) -> &ModeCatalogue {
        &self.catalogue
    }

    pub fn options(&self) -> SupervisorOptions {
        self.options
    }

    fn slot(&self, mode: RunMode) -> &Arc<Mutex<Slot>> {
        // Populated for every RunMode in new()
        &self.slots[&mode]
    }

    fn spawn_one(mode: RunMode, command: &CommandLine) -> Result<Child> {
        process::spawn(command).map_err(|source| {
            let command = command.to_string();
            error!(mode = %mode, command = %command, error = %source, "Failed to spawn process");
            SupervisorError::SpawnError {
                mode,
                command,
                source,
            }
        })
    }

    /// Launch the command for `mode`, merging `args` over the mode defaults.
    ///
    /// Modes with a web companion start it first; if the main command then
    /// fails to spawn, the companion is killed again.
    pub async fn start(&self, mode: RunMode, args: &BotArgs) -> Result<ProcessHandle> {
        let mut slot = self.slot(mode).lock().await;
        slot.refresh(self.options.startup_grace);
        if slot.is_live() {
            return Err(SupervisorError::AlreadyRunning(mode));
        }

        let resolved = self.catalogue.resolve(mode, args);
        let mut companion = match &resolved.companion {
            Some(web) => Some((Self::spawn_one(mode, web)?, web.to_string())),
            None => None,
        };
        let mut child = match Self::spawn_one(mode, &resolved.command) {
            Ok(child) => child,
            Err(e) => {
                if let Some((mut web, _)) = companion.take() {
                    let web_pid = web.id().unwrap_or_default();
                    process::kill(&mut web, web_pid);
                    let _ = web.wait().await;
                }
                return Err(e);
            }
        };
        let pid = child.id().unwrap_or_default();

        let output = OutputBuffer::new(self.options.output_lines);
        if let Some(stdout) = child.stdout.take() {
            output.capture(stdout, mode.to_string());
        }
        if let Some(stderr) = child.stderr.take() {
            output.capture(stderr, mode.to_string());
        }

        let mut companion_info = None;
        if let Some((web, command)) = companion.as_mut() {
            let label = format!("{}/web", mode);
            if let Some(stdout) = web.stdout.take() {
                output.capture(stdout, label.clone());
            }
            if let Some(stderr) = web.stderr.take() {
                output.capture(stderr, label);
            }
            let web_pid = web.id().unwrap_or_default();
            info!(mode = %mode, pid = web_pid, command = %command, "Web companion started");
            companion_info = Some(CompanionProcess {
                pid: web_pid,
                command: command.clone(),
            });
        }

        let handle = ProcessHandle {
            mode,
            pid,
            started_at: Utc::now(),
            status: ProcessStatus::Starting,
            last_exit_code: None,
            ended_at: None,
            command: resolved.command.to_string(),
            args: resolved.args,
            companion: companion_info,
        };
        info!(mode = %mode, pid = pid, command = %handle.command, "Process started");

        slot.handle = Some(handle.clone());
        slot.child = Some(child);
        slot.companion = companion.map(|(web, _)| web);
        slot.spawned_at = Some(Instant::now());
        slot.output = output;
        Ok(handle)
    }

    /// Stop the live process for `mode`, and its web companion if it has one.
    ///
    /// With `graceful`, the process gets `stop_timeout` to exit after SIGTERM
    /// before it is killed. The returned ack says whether the kill was needed.
    /// The mode reads as `Stopping` while the wait is in progress; its lock is
    /// not held during the wait.
    pub async fn stop(&self, mode: RunMode, graceful: bool) -> Result<StopAck> {
        let (mut child, mut companion, pid, web_pid) = {
            let mut slot = self.slot(mode).lock().await;
            slot.refresh(self.options.startup_grace);
            if !slot.is_live() {
                return Err(SupervisorError::NotRunning(mode));
            }
            // A concurrent stop already took the child
            let Some(child) = slot.child.take() else {
                return Err(SupervisorError::NotRunning(mode));
            };
            let companion = slot.companion.take();
            let Some(handle) = slot.handle.as_mut() else {
                return Err(SupervisorError::NotRunning(mode));
            };
            handle.status = ProcessStatus::Stopping;
            let web_pid = handle.companion.as_ref().map(|c| c.pid).unwrap_or_default();
            (child, companion, handle.pid, web_pid)
        };

        // The wait runs detached so a dropped caller cannot strand the mode in Stopping
        let slot = Arc::clone(self.slot(mode));
        let options = self.options;
        let finish = tokio::spawn(async move {
            let (halted, web_halted) = tokio::join!(
                halt(options, mode, &mut child, pid, graceful),
                async {
                    match companion.as_mut() {
                        Some(web) => Some(halt(options, mode, web, web_pid, graceful).await),
                        None => None,
                    }
                }
            );

            let mut slot = slot.lock().await;
            if let Some(Halt::Unreaped) = web_halted {
                warn!(mode = %mode, pid = web_pid, "Web companion left to kill_on_drop");
            }
            let (exit_code, forced) = match halted {
                Halt::Exited { exit_code, forced } => (exit_code, forced),
                Halt::Unreaped => {
                    slot.child = Some(child);
                    if let Some(handle) = slot.handle.as_mut() {
                        handle.status = ProcessStatus::Running;
                    }
                    return Err(SupervisorError::LaunchTimeout {
                        mode,
                        waited: options.kill_timeout,
                    });
                }
            };

            if let Some(handle) = slot.handle.as_mut() {
                handle.status = ProcessStatus::Stopped;
                handle.last_exit_code = exit_code;
                handle.ended_at = Some(Utc::now());
            }
            info!(mode = %mode, pid = pid, exit_code = ?exit_code, forced = forced, "Process stopped");

            Ok(StopAck {
                mode,
                pid,
                exit_code,
                forced,
            })
        });

        match finish.await {
            Ok(result) => result,
            Err(e) => match e.try_into_panic() {
                Ok(panic) => std::panic::resume_unwind(panic),
                Err(_) => Err(SupervisorError::NotRunning(mode)),
            },
        }
    }

    /// Gracefully stop `mode` if it is live, then start it again.
    pub async fn restart(&self, mode: RunMode, args: &BotArgs) -> Result<ProcessHandle> {
        match self.stop(mode, true).await {
            Ok(_) | Err(SupervisorError::NotRunning(_)) => {}
            Err(e) => return Err(e),
        }
        self.start(mode, args).await
    }

    /// Current snapshot for `mode`, or `None` if it was never launched.
    pub async fn status(&self, mode: RunMode) -> Option<ProcessHandle> {
        let mut slot = self.slot(mode).lock().await;
        slot.refresh(self.options.startup_grace);
        slot.handle.clone()
    }

    /// Snapshots of every mode that has been launched, in menu order.
    pub async fn status_all(&self) -> Vec<ProcessHandle> {
        let mut handles = Vec::new();
        for mode in RunMode::ALL {
            if let Some(handle) = self.status(mode).await {
                handles.push(handle);
            }
        }
        handles
    }

    /// The last `lines` lines of output captured from the mode's latest launch.
    pub async fn logs(&self, mode: RunMode, lines: usize) -> Vec<String> {
        let slot = self.slot(mode).lock().await;
        slot.output.tail(lines)
    }

    /// One liveness pass over every mode. Modes whose lock is held are skipped.
    pub fn poll_liveness(&self) {
        for mode in RunMode::ALL {
            if let Ok(mut slot) = self.slot(mode).try_lock() {
                slot.refresh(self.options.startup_grace);
            }
        }
    }

    /// Run `poll_liveness` every `interval` until `cancel` fires.
    pub fn spawn_liveness_monitor(
        self: &Arc<Self>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let supervisor = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("Liveness monitor stopped");
                        break;
                    }
                    _ = ticker.tick() => supervisor.poll_liveness(),
                }
            }
        })
    }

    /// Gracefully stop every live process.
    pub async fn shutdown(&self) {
        for mode in RunMode::ALL {
            match self.stop(mode, true).await {
                Ok(ack) => info!(mode = %mode, forced = ack.forced, "Stopped on shutdown"),
                Err(SupervisorError::NotRunning(_)) => {}
                Err(e) => error!(mode = %mode, error = %e, "Failed to stop on shutdown"),
            }
        }
    }
}
