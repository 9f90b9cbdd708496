// ABOUTME: Terminal rendering of process snapshots, stop acks and the mode catalogue.
// ABOUTME: Colour follows status: green running, yellow starting, red crashed.

use chrono::{DateTime, Utc};
use colored::{ColoredString, Colorize};
use helmsman_core::{ModeInfo, ProcessHandle, ProcessStatus, StopAck};

pub fn status_label(status: ProcessStatus) -> ColoredString {
    let label = status.to_string();
    match status {
        ProcessStatus::Starting => label.yellow(),
        ProcessStatus::Running => label.green(),
        ProcessStatus::Stopping => label.yellow(),
        ProcessStatus::Stopped => label.normal(),
        ProcessStatus::Crashed => label.red().bold(),
    }
}

pub fn print_handle(handle: &ProcessHandle) {
    println!(
        "{} {} {}",
        handle.mode.to_string().bold(),
        status_label(handle.status),
        format!("(pid {})", handle.pid).dimmed()
    );
    println!(
        "    {}: {} ({} ago)",
        "Started".dimmed(),
        handle.started_at.format("%Y-%m-%d %H:%M:%S UTC"),
        elapsed(handle.started_at, Utc::now())
    );
    if let Some(code) = handle.last_exit_code {
        println!("    {}: {}", "Exit code".dimmed(), code);
    }
    println!("    {}: {}", "Command".dimmed(), handle.command);
    if let Some(web) = &handle.companion {
        println!("    {}: {} {}", "Web".dimmed(), web.command, format!("(pid {})", web.pid).dimmed());
    }
}

/// Compact age such as `42s`, `5m`, `3h` or `2d`.
pub fn elapsed(since: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - since).num_seconds().max(0);
    match secs {
        s if s < 60 => format!("{}s", s),
        s if s < 3600 => format!("{}m", s / 60),
        s if s < 86_400 => format!("{}h", s / 3600),
        s => format!("{}d", s / 86_400),
    }
}

pub fn print_handles(handles: &[ProcessHandle]) {
    if handles.is_empty() {
        println!("{}", "No modes launched".dimmed());
        return;
    }
    for handle in handles {
        print_handle(handle);
    }
}

pub fn print_stop(ack: &StopAck) {
    let how = if ack.forced { "killed" } else { "stopped" };
    let code = ack
        .exit_code
        .map(|c| c.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    println!(
        "{} {} {}",
        ack.mode.to_string().bold(),
        how.green(),
        format!("(pid {}, exit code {})", ack.pid, code).dimmed()
    );
}

pub fn print_modes(modes: &[ModeInfo]) {
    for info in modes {
        println!(
            "{} {} {}",
            format!("{}.", info.menu_choice).cyan(),
            info.mode.to_string().bold(),
            info.description.dimmed()
        );
        println!("    {}", info.command);
        if let Some(web) = &info.companion {
            println!("    {}", web);
        }
    }
}
