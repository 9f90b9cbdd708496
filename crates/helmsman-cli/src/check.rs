// ABOUTME: System check: is the interpreter installed, are the mode entrypoints present?
// ABOUTME: Any missing runtime dependency makes `helmsman check` exit 1.

use colored::Colorize;
use helmsman_core::{BotArgs, Config, RunMode};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// One checked dependency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckItem {
    pub name: String,
    pub detail: String,
    pub ok: bool,
}

#[derive(Debug, Clone, Default)]
pub struct CheckReport {
    pub items: Vec<CheckItem>,
}

impl CheckReport {
    pub fn missing(&self) -> usize {
        self.items.iter().filter(|i| !i.ok).count()
    }

    pub fn passed(&self) -> bool {
        self.missing() == 0
    }

    pub fn print(&self) {
        for item in &self.items {
            let mark = if item.ok { "✓".green() } else { "✗".red() };
            println!("  {} {:<28} {}", mark, item.name, item.detail.dimmed());
        }
    }
}

/// Locate `program` the way a shell would: as a path if it has a separator,
/// otherwise by searching `path_var`.
pub fn find_program(program: &str, path_var: Option<OsString>) -> Option<PathBuf> {
    let candidate = Path::new(program);
    if candidate.components().count() > 1 {
        return is_executable(candidate).then(|| candidate.to_path_buf());
    }
    let path_var = path_var?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(program))
        .find(|p| is_executable(p))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

fn script_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Check every program and script the configured modes would launch.
pub fn run_checks(config: &Config, path_var: Option<OsString>) -> anyhow::Result<CheckReport> {
    let catalogue = config.catalogue()?;
    let bot_dir = catalogue.bot_dir().clone();
    let mut report = CheckReport::default();

    report.items.push(CheckItem {
        name: "bot directory".to_string(),
        detail: bot_dir.display().to_string(),
        ok: bot_dir.is_dir(),
    });

    let mut programs: Vec<String> = Vec::new();
    let mut scripts: Vec<(RunMode, PathBuf)> = Vec::new();
    for mode in RunMode::ALL {
        let resolved = catalogue.resolve(mode, &BotArgs::default());
        for command in std::iter::once(&resolved.command).chain(resolved.companion.as_ref()) {
            if !programs.contains(&command.program) {
                programs.push(command.program.clone());
            }
            // Only interpreter-run commands have a script argument to check
            if command.program == catalogue.interpreter() {
                if let Some(script) = command.args.first() {
                    scripts.push((mode, bot_dir.join(script)));
                }
            }
        }
    }

    for program in programs {
        let found = find_program(&program, path_var.clone());
        report.items.push(CheckItem {
            ok: found.is_some(),
            detail: found
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "not found on PATH".to_string()),
            name: program,
        });
    }

    for (mode, script) in scripts {
        report.items.push(CheckItem {
            name: format!("{} entrypoint {}", mode, script_name(&script)),
            detail: script.display().to_string(),
            ok: script.is_file(),
        });
    }

    Ok(report)
}
