// ABOUTME: The quick-start launcher menu: pick a run mode by number, 0 to exit.
// ABOUTME: Anything else is an invalid selection and the CLI exits 1.

use anyhow::{bail, Result};
use colored::Colorize;
use helmsman_core::{BotArgs, RunMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    Exit,
    Launch(RunMode),
}

/// Parse a menu selection typed by the operator.
pub fn parse_choice(input: &str) -> Result<MenuChoice> {
    let input = input.trim();
    if input == "0" {
        return Ok(MenuChoice::Exit);
    }
    match RunMode::from_menu_choice(input) {
        Some(mode) => Ok(MenuChoice::Launch(mode)),
        None => bail!("Invalid choice: {:?} (expected 0-{})", input, RunMode::ALL.len()),
    }
}

/// Reject modes that cannot run without a terminal attached.
pub fn supervised(mode: RunMode) -> Result<RunMode> {
    if mode.needs_terminal() {
        bail!(
            "{} reads from a terminal and cannot run under the supervisor; run {} in the bot directory instead",
            mode,
            mode.entrypoint()
        );
    }
    Ok(mode)
}

/// Bot arguments from the pair-count prompt. Empty input keeps the mode default.
pub fn parse_pairs(input: &str) -> Result<BotArgs> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(BotArgs::default());
    }
    match input.parse::<u32>() {
        Ok(pairs) if pairs > 0 => Ok(BotArgs {
            pairs: Some(pairs),
            ..BotArgs::default()
        }),
        _ => bail!("Invalid pair count: {:?}", input),
    }
}

pub fn print_menu() {
    println!();
    println!("{}", "=".repeat(60).dimmed());
    println!("{}", "helmsman - quick start".bold());
    println!("{}", "=".repeat(60).dimmed());
    println!();
    for mode in RunMode::ALL {
        println!(
            "  {}  {}",
            format!("{}.", mode.menu_choice()).cyan(),
            mode.description()
        );
    }
    println!("  {}  Exit", "0.".cyan());
    println!();
}
