// ABOUTME: Configuration for the helmsman control plane.
// ABOUTME: Loaded from a TOML file with sensible defaults, then overridden by environment variables.

use crate::mode::{ModeCatalogue, RunMode};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerSettings,

    #[serde(default)]
    pub auth: AuthSettings,

    #[serde(default)]
    pub supervisor: SupervisorSettings,

    /// Per-mode command overrides, keyed by mode name (e.g. `[modes.bot_only]`)
    #[serde(default)]
    pub modes: BTreeMap<String, ModeOverride>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerSettings {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// How a session's expiry moves after it is issued.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExpiryPolicy {
    /// Expires `session_ttl_secs` after login regardless of activity
    #[default]
    Fixed,
    /// Every successful validation pushes expiry out by `session_ttl_secs`
    Sliding,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSettings {
    #[serde(default = "default_username")]
    pub username: String,

    #[serde(default = "default_password")]
    pub password: String,

    /// Hex SHA-256 of the password; takes precedence over `password` when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_sha256: Option<String>,

    /// Secret mixed into session token digests. Random per process when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_secret: Option<String>,

    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,

    #[serde(default)]
    pub expiry: ExpiryPolicy,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            username: default_username(),
            password: default_password(),
            password_sha256: None,
            session_secret: None,
            session_ttl_secs: default_session_ttl_secs(),
            expiry: ExpiryPolicy::default(),
        }
    }
}

/// Longest session lifetime accepted in `[auth] session_ttl_secs`.
pub const MAX_SESSION_TTL_SECS: u64 = 366 * 24 * 60 * 60;

impl AuthSettings {
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorSettings {
    /// Interpreter used to run bot entrypoints
    #[serde(default = "default_interpreter")]
    pub interpreter: String,

    /// Directory containing the bot entrypoints; children run with it as cwd
    #[serde(default = "default_bot_dir")]
    pub bot_dir: String,

    /// How long a graceful stop waits before forcing termination
    #[serde(default = "default_stop_timeout_ms")]
    pub stop_timeout_ms: u64,

    /// How long to wait for a forcibly killed child to be reaped
    #[serde(default = "default_kill_timeout_ms")]
    pub kill_timeout_ms: u64,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// A child alive this long after spawn is reported as running
    #[serde(default = "default_startup_grace_ms")]
    pub startup_grace_ms: u64,

    /// Captured output lines kept per mode
    #[serde(default = "default_output_lines")]
    pub output_lines: usize,
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self {
            interpreter: default_interpreter(),
            bot_dir: default_bot_dir(),
            stop_timeout_ms: default_stop_timeout_ms(),
            kill_timeout_ms: default_kill_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            startup_grace_ms: default_startup_grace_ms(),
            output_lines: default_output_lines(),
        }
    }
}

impl SupervisorSettings {
    /// Expand ~ in the bot directory path
    pub fn bot_dir_expanded(&self) -> PathBuf {
        shellexpand::tilde(&self.bot_dir).into_owned().into()
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }

    pub fn kill_timeout(&self) -> Duration {
        Duration::from_millis(self.kill_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn startup_grace(&self) -> Duration {
        Duration::from_millis(self.startup_grace_ms)
    }
}

/// Replaces a mode's command template.
///
/// With `program` set, the command is `program args...`; with only `args` set,
/// the configured interpreter runs `args...`. Bot flags are appended either way
/// for modes that take them.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModeOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub program: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<String>>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_username() -> String {
    "admin".to_string()
}

fn default_password() -> String {
    "admin123".to_string()
}

fn default_session_ttl_secs() -> u64 {
    24 * 60 * 60
}

fn default_interpreter() -> String {
    "python3".to_string()
}

fn default_bot_dir() -> String {
    ".".to_string()
}

fn default_stop_timeout_ms() -> u64 {
    10_000
}

fn default_kill_timeout_ms() -> u64 {
    5_000
}

fn default_poll_interval_ms() -> u64 {
    1_000
}

fn default_startup_grace_ms() -> u64 {
    1_000
}

fn default_output_lines() -> usize {
    500
}

impl Config {
    /// Load config from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))?;
        config
            .mode_overrides()
            .with_context(|| format!("Invalid [modes] section in {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("Invalid config in {}", path.display()))?;
        Ok(config)
    }

    /// Save config to a TOML file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory {}", parent.display())
            })?;
        }
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config to {}", path.display()))?;
        Ok(())
    }

    /// Get the default config file path (~/.config/helmsman/helmsman.toml)
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = std::env::var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::home_dir()
                    .map(|h| h.join(".config"))
                    .unwrap_or_else(|| PathBuf::from("."))
            })
            .join("helmsman");
        Ok(config_dir.join("helmsman.toml"))
    }

    /// Load from `path` if given, else from the default path when it exists,
    /// else defaults. Environment overrides are applied last.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load(path)?,
            None => {
                let default = Self::default_path()?;
                if default.exists() {
                    Self::load(&default)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply environment overrides using `lookup` to read variables.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(username) = lookup("ADMIN_USERNAME") {
            self.auth.username = username;
        }
        if let Some(password) = lookup("ADMIN_PASSWORD") {
            self.auth.password = password;
            self.auth.password_sha256 = None;
        }
        if let Some(secret) = lookup("SECRET_KEY") {
            self.auth.session_secret = Some(secret);
        }
        if let Some(host) = lookup("WEB_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("WEB_PORT") {
            self.server.port = port
                .trim()
                .parse()
                .with_context(|| format!("WEB_PORT is not a valid port: {}", port))?;
        }
        if let Some(interpreter) = lookup("HELMSMAN_INTERPRETER") {
            self.supervisor.interpreter = interpreter;
        }
        if let Some(bot_dir) = lookup("HELMSMAN_BOT_DIR") {
            self.supervisor.bot_dir = bot_dir;
        }
        Ok(())
    }

    /// Reject values the server cannot run with.
    pub fn validate(&self) -> Result<()> {
        let ttl = self.auth.session_ttl_secs;
        if ttl == 0 || ttl > MAX_SESSION_TTL_SECS {
            bail!(
                "[auth] session_ttl_secs must be between 1 and {}, got {}",
                MAX_SESSION_TTL_SECS,
                ttl
            );
        }
        Ok(())
    }

    /// Parsed `[modes]` overrides
    pub fn mode_overrides(&self) -> Result<Vec<(RunMode, ModeOverride)>> {
        self.modes
            .iter()
            .map(|(name, mode_override)| -> Result<(RunMode, ModeOverride)> {
                let mode: RunMode = name.parse()?;
                Ok((mode, mode_override.clone()))
            })
            .collect()
    }

    /// Mode catalogue built from the supervisor settings and `[modes]` overrides
    pub fn catalogue(&self) -> Result<ModeCatalogue> {
        Ok(ModeCatalogue::from_settings(
            &self.supervisor,
            self.mode_overrides()?,
        ))
    }
}
