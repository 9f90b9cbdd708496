// ABOUTME: Run modes the supervisor can launch and the commands they map to.
// ABOUTME: Merges caller-supplied bot arguments over per-mode defaults.

use crate::config::{ModeOverride, SupervisorSettings};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

/// A named combination of entrypoint and default arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// The bot's own prompt-driven launcher. Supervised children get no stdin,
    /// so under the supervisor it exits at its first prompt.
    InteractiveMenu,
    /// Web interface (`run.py`) and bot (`main.py`) side by side in one handle.
    WebPlusBot,
    WebOnly,
    BotOnly,
    Demo,
    SystemCheck,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown run mode: {0} (expected one of interactive_menu, web_plus_bot, web_only, bot_only, demo, system_check)")]
pub struct ParseModeError(pub String);

impl RunMode {
    /// Every mode, in launcher menu order.
    pub const ALL: [RunMode; 6] = [
        RunMode::InteractiveMenu,
        RunMode::WebPlusBot,
        RunMode::WebOnly,
        RunMode::BotOnly,
        RunMode::Demo,
        RunMode::SystemCheck,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::InteractiveMenu => "interactive_menu",
            RunMode::WebPlusBot => "web_plus_bot",
            RunMode::WebOnly => "web_only",
            RunMode::BotOnly => "bot_only",
            RunMode::Demo => "demo",
            RunMode::SystemCheck => "system_check",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            RunMode::InteractiveMenu => "Interactive quick-start menu",
            RunMode::WebPlusBot => "Web interface plus bot on testnet",
            RunMode::WebOnly => "Web interface only",
            RunMode::BotOnly => "Trading bot only",
            RunMode::Demo => "Demonstration mode (no trading)",
            RunMode::SystemCheck => "System check of files and dependencies",
        }
    }

    /// Number shown for this mode in the launcher menu (1-based).
    pub fn menu_choice(&self) -> usize {
        Self::ALL.iter().position(|m| m == self).unwrap_or(0) + 1
    }

    /// Parse a launcher menu selection ("1".."6").
    pub fn from_menu_choice(choice: &str) -> Option<RunMode> {
        let n: usize = choice.trim().parse().ok()?;
        n.checked_sub(1).and_then(|i| Self::ALL.get(i)).copied()
    }

    /// Entrypoint and fixed flags this mode runs when not overridden by config.
    fn template(&self) -> (&'static str, &'static [&'static str]) {
        match self {
            RunMode::InteractiveMenu => ("quickstart.py", &[]),
            RunMode::WebPlusBot => ("main.py", &["--config", "balanced", "--verbose"]),
            RunMode::WebOnly => ("run.py", &[]),
            RunMode::BotOnly => ("main.py", &[]),
            RunMode::Demo => ("demo_mode.py", &[]),
            RunMode::SystemCheck => ("check_all.py", &[]),
        }
    }

    /// Second process launched alongside the main one.
    fn companion_template(&self) -> Option<(&'static str, &'static [&'static str])> {
        match self {
            RunMode::WebPlusBot => Some(("run.py", &[])),
            _ => None,
        }
    }

    /// Script file this mode launches, relative to the bot directory.
    pub fn entrypoint(&self) -> &'static str {
        self.template().0
    }

    /// Script of the companion process, if this mode runs one.
    pub fn companion_entrypoint(&self) -> Option<&'static str> {
        self.companion_template().map(|(script, _)| script)
    }

    /// Modes that read from a terminal and cannot run detached.
    pub fn needs_terminal(&self) -> bool {
        matches!(self, RunMode::InteractiveMenu)
    }

    /// Default bot arguments, or `None` for modes that take no bot flags.
    pub fn default_args(&self) -> Option<BotArgs> {
        match self {
            RunMode::WebPlusBot | RunMode::BotOnly => Some(BotArgs {
                pairs: Some(20),
                testnet: Some(true),
                interval_secs: None,
            }),
            _ => None,
        }
    }

    pub fn accepts_bot_args(&self) -> bool {
        self.default_args().is_some()
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunMode {
    type Err = ParseModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == normalized)
            .ok_or_else(|| ParseModeError(s.to_string()))
    }
}

/// Bot command-line arguments. Unset fields fall back to the mode defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotArgs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pairs: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub testnet: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval_secs: Option<u64>,
}

impl BotArgs {
    pub fn is_empty(&self) -> bool {
        self.pairs.is_none() && self.testnet.is_none() && self.interval_secs.is_none()
    }

    /// Returns these arguments with any unset field taken from `defaults`.
    pub fn merged_over(&self, defaults: &BotArgs) -> BotArgs {
        BotArgs {
            pairs: self.pairs.or(defaults.pairs),
            testnet: self.testnet.or(defaults.testnet),
            interval_secs: self.interval_secs.or(defaults.interval_secs),
        }
    }

    /// Render as bot entrypoint flags: `--pairs N --testnet --interval S`.
    pub fn to_flags(&self) -> Vec<String> {
        let mut flags = Vec::new();
        if let Some(pairs) = self.pairs {
            flags.push("--pairs".to_string());
            flags.push(pairs.to_string());
        }
        if self.testnet == Some(true) {
            flags.push("--testnet".to_string());
        }
        if let Some(interval) = self.interval_secs {
            flags.push("--interval".to_string());
            flags.push(interval.to_string());
        }
        flags
    }
}

/// A concrete command ready to be spawned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " '{}'", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

/// Command for one launch plus the bot arguments it was built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCommand {
    pub command: CommandLine,
    /// Web process started before `command` and stopped with it
    pub companion: Option<CommandLine>,
    pub args: BotArgs,
}

/// Maps run modes to commands using the interpreter, bot directory and
/// per-mode overrides from configuration.
#[derive(Debug, Clone)]
pub struct ModeCatalogue {
    interpreter: String,
    bot_dir: PathBuf,
    overrides: BTreeMap<RunMode, ModeOverride>,
}

impl ModeCatalogue {
    pub fn new(interpreter: impl Into<String>, bot_dir: impl Into<PathBuf>) -> Self {
        Self {
            interpreter: interpreter.into(),
            bot_dir: bot_dir.into(),
            overrides: BTreeMap::new(),
        }
    }

    pub fn from_settings(
        settings: &SupervisorSettings,
        overrides: impl IntoIterator<Item = (RunMode, ModeOverride)>,
    ) -> Self {
        let mut catalogue = Self::new(settings.interpreter.clone(), settings.bot_dir_expanded());
        catalogue.overrides.extend(overrides);
        catalogue
    }

    pub fn with_override(mut self, mode: RunMode, mode_override: ModeOverride) -> Self {
        self.overrides.insert(mode, mode_override);
        self
    }

    pub fn bot_dir(&self) -> &PathBuf {
        &self.bot_dir
    }

    pub fn interpreter(&self) -> &str {
        &self.interpreter
    }

    /// Build the command for `mode`, merging `args` over the mode defaults.
    /// Modes without bot flags ignore `args`.
    pub fn resolve(&self, mode: RunMode, args: &BotArgs) -> ResolvedCommand {
        let (script, fixed) = mode.template();
        let override_program = self
            .overrides
            .get(&mode)
            .is_some_and(|o| o.program.is_some());
        let (program, mut argv) = match self.overrides.get(&mode) {
            Some(ModeOverride {
                program: Some(program),
                args,
            }) => (program.clone(), args.clone().unwrap_or_default()),
            Some(ModeOverride {
                program: None,
                args: Some(args),
            }) => (self.interpreter.clone(), args.clone()),
            _ => {
                let mut argv = vec![script.to_string()];
                argv.extend(fixed.iter().map(|s| s.to_string()));
                (self.interpreter.clone(), argv)
            }
        };

        let effective = match mode.default_args() {
            Some(defaults) => {
                let merged = args.merged_over(&defaults);
                argv.extend(merged.to_flags());
                merged
            }
            None => {
                if !args.is_empty() {
                    tracing::warn!(mode = %mode, "Mode takes no bot arguments, ignoring them");
                }
                BotArgs::default()
            }
        };

        // A program override replaces the whole launch, companion included
        let companion = mode
            .companion_template()
            .filter(|_| !override_program)
            .map(|(script, fixed)| {
                let mut args = vec![script.to_string()];
                args.extend(fixed.iter().map(|s| s.to_string()));
                CommandLine {
                    program: self.interpreter.clone(),
                    args,
                    working_dir: self.bot_dir.clone(),
                }
            });

        ResolvedCommand {
            command: CommandLine {
                program,
                args: argv,
                working_dir: self.bot_dir.clone(),
            },
            companion,
            args: effective,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalogue() -> ModeCatalogue {
        ModeCatalogue::new("python3", "/opt/bot")
    }

    #[test]
    fn test_parse_mode_names() {
        assert_eq!("bot_only".parse::<RunMode>().unwrap(), RunMode::BotOnly);
        assert_eq!("web-plus-bot".parse::<RunMode>().unwrap(), RunMode::WebPlusBot);
        assert_eq!(" System_Check ".parse::<RunMode>().unwrap(), RunMode::SystemCheck);
        assert!("trading".parse::<RunMode>().is_err());
    }

    #[test]
    fn test_display_round_trips_through_from_str() {
        for mode in RunMode::ALL {
            assert_eq!(mode.to_string().parse::<RunMode>().unwrap(), mode);
        }
    }

    #[test]
    fn test_menu_choices() {
        assert_eq!(RunMode::from_menu_choice("1"), Some(RunMode::InteractiveMenu));
        assert_eq!(RunMode::from_menu_choice("4"), Some(RunMode::BotOnly));
        assert_eq!(RunMode::from_menu_choice(" 6 "), Some(RunMode::SystemCheck));
        assert_eq!(RunMode::from_menu_choice("0"), None);
        assert_eq!(RunMode::from_menu_choice("7"), None);
        assert_eq!(RunMode::from_menu_choice("x"), None);
        assert_eq!(RunMode::Demo.menu_choice(), 5);
    }

    #[test]
    fn test_serde_uses_snake_case() {
        let json = serde_json::to_string(&RunMode::WebOnly).unwrap();
        assert_eq!(json, "\"web_only\"");
        let mode: RunMode = serde_json::from_str("\"bot_only\"").unwrap();
        assert_eq!(mode, RunMode::BotOnly);
    }

    #[test]
    fn test_bot_only_defaults() {
        let resolved = catalogue().resolve(RunMode::BotOnly, &BotArgs::default());
        assert_eq!(resolved.command.program, "python3");
        assert_eq!(
            resolved.command.args,
            vec!["main.py", "--pairs", "20", "--testnet"]
        );
        assert_eq!(resolved.command.working_dir, PathBuf::from("/opt/bot"));
        assert_eq!(resolved.args.pairs, Some(20));
        assert_eq!(resolved.args.testnet, Some(true));
    }

    #[test]
    fn test_explicit_args_override_defaults() {
        let args = BotArgs {
            pairs: Some(50),
            testnet: Some(false),
            interval_secs: Some(60),
        };
        let resolved = catalogue().resolve(RunMode::BotOnly, &args);
        assert_eq!(
            resolved.command.args,
            vec!["main.py", "--pairs", "50", "--interval", "60"]
        );
        assert_eq!(resolved.args, args);
    }

    #[test]
    fn test_partial_args_keep_other_defaults() {
        let args = BotArgs {
            pairs: Some(5),
            ..BotArgs::default()
        };
        let resolved = catalogue().resolve(RunMode::WebPlusBot, &args);
        assert_eq!(
            resolved.command.args,
            vec!["main.py", "--config", "balanced", "--verbose", "--pairs", "5", "--testnet"]
        );
    }

    #[test]
    fn test_web_plus_bot_launches_web_and_bot() {
        let resolved = catalogue().resolve(RunMode::WebPlusBot, &BotArgs::default());
        let web = resolved.companion.expect("web companion");
        assert_eq!(web.program, "python3");
        assert_eq!(web.args, vec!["run.py"]);
        assert_eq!(web.working_dir, PathBuf::from("/opt/bot"));
        assert_eq!(resolved.command.args[0], "main.py");
        assert_eq!(RunMode::WebPlusBot.companion_entrypoint(), Some("run.py"));

        for mode in [RunMode::BotOnly, RunMode::WebOnly, RunMode::Demo] {
            assert!(catalogue().resolve(mode, &BotArgs::default()).companion.is_none());
        }
    }

    #[test]
    fn test_program_override_drops_companion() {
        let catalogue = catalogue().with_override(
            RunMode::WebPlusBot,
            ModeOverride {
                program: Some("/bin/sh".to_string()),
                args: Some(vec!["-c".to_string(), "sleep 1".to_string()]),
            },
        );
        let resolved = catalogue.resolve(RunMode::WebPlusBot, &BotArgs::default());
        assert!(resolved.companion.is_none());
    }

    #[test]
    fn test_only_interactive_menu_needs_terminal() {
        let needy: Vec<_> = RunMode::ALL.into_iter().filter(|m| m.needs_terminal()).collect();
        assert_eq!(needy, vec![RunMode::InteractiveMenu]);
    }

    #[test]
    fn test_web_only_ignores_bot_args() {
        let args = BotArgs {
            pairs: Some(5),
            ..BotArgs::default()
        };
        let resolved = catalogue().resolve(RunMode::WebOnly, &args);
        assert_eq!(resolved.command.args, vec!["run.py"]);
        assert!(resolved.args.is_empty());
    }

    #[test]
    fn test_program_override_replaces_template() {
        let catalogue = catalogue().with_override(
            RunMode::Demo,
            ModeOverride {
                program: Some("/bin/sh".to_string()),
                args: Some(vec!["-c".to_string(), "sleep 1".to_string()]),
            },
        );
        let resolved = catalogue.resolve(RunMode::Demo, &BotArgs::default());
        assert_eq!(resolved.command.program, "/bin/sh");
        assert_eq!(resolved.command.args, vec!["-c", "sleep 1"]);
    }

    #[test]
    fn test_args_override_keeps_interpreter_and_bot_flags() {
        let catalogue = catalogue().with_override(
            RunMode::BotOnly,
            ModeOverride {
                program: None,
                args: Some(vec!["bot/entry.py".to_string()]),
            },
        );
        let resolved = catalogue.resolve(RunMode::BotOnly, &BotArgs::default());
        assert_eq!(resolved.command.program, "python3");
        assert_eq!(
            resolved.command.args,
            vec!["bot/entry.py", "--pairs", "20", "--testnet"]
        );
    }

    #[test]
    fn test_command_line_display_quotes_spaces() {
        let cmd = CommandLine {
            program: "/bin/sh".to_string(),
            args: vec!["-c".to_string(), "sleep 30".to_string()],
            working_dir: PathBuf::from("."),
        };
        assert_eq!(cmd.to_string(), "/bin/sh -c 'sleep 30'");
    }
}
