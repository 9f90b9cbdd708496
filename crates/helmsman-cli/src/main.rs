// ABOUTME: Entry point for the helmsman binary.
// ABOUTME: Dispatches serve, session, lifecycle, menu and check subcommands.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use dialoguer::{Input, Password};
use helmsman_cli::{check, client_for, menu, render};
use helmsman_client::{StoredSession, TokenStore, DEFAULT_SERVER};
use helmsman_core::{BotArgs, Config, RunMode};
use std::path::PathBuf;
use tracing::debug;

#[derive(Parser)]
#[command(name = "helmsman")]
#[command(about = "Control plane for a supervised trading bot")]
#[command(version)]
struct Cli {
    /// Control API base URL
    #[arg(long, global = true, env = "HELMSMAN_SERVER", default_value = DEFAULT_SERVER)]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the Control API server
    Serve {
        /// Listen host (overrides config and WEB_HOST)
        #[arg(long)]
        host: Option<String>,

        /// Listen port (overrides config and WEB_PORT)
        #[arg(long)]
        port: Option<u16>,

        /// Path to configuration file
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Log in and remember the session token
    Login {
        #[arg(long, short = 'u', env = "HELMSMAN_USERNAME")]
        username: Option<String>,

        /// Password (prompted when omitted)
        #[arg(long, env = "HELMSMAN_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Revoke the stored session
    Logout,

    /// Show whether the stored session is still valid
    Whoami,

    /// Launch a run mode
    Start {
        mode: RunMode,

        #[command(flatten)]
        args: BotFlags,
    },

    /// Stop a run mode
    Stop {
        mode: RunMode,

        /// Kill immediately instead of waiting for a graceful exit
        #[arg(long)]
        force: bool,
    },

    /// Stop a run mode if it is live, then launch it again
    Restart {
        mode: RunMode,

        #[command(flatten)]
        args: BotFlags,
    },

    /// Show process status for one mode or all launched modes
    Status { mode: Option<RunMode> },

    /// Show captured output of a mode's latest process
    Logs {
        mode: RunMode,

        /// Number of lines
        #[arg(short = 'n', long, default_value_t = 100)]
        lines: usize,
    },

    /// List run modes and the commands they launch
    Modes,

    /// Quick-start menu
    Menu,

    /// Check the interpreter and entrypoint scripts
    Check {
        /// Path to configuration file
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

/// Bot flags accepted by start and restart.
#[derive(Args, Debug, Default)]
struct BotFlags {
    /// Number of pairs to trade
    #[arg(long)]
    pairs: Option<u32>,

    /// Trade on testnet
    #[arg(long, conflicts_with = "mainnet")]
    testnet: bool,

    /// Trade on mainnet
    #[arg(long)]
    mainnet: bool,

    /// Seconds between bot cycles
    #[arg(long)]
    interval: Option<u64>,
}

impl From<BotFlags> for BotArgs {
    fn from(flags: BotFlags) -> Self {
        let testnet = match (flags.testnet, flags.mainnet) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        };
        BotArgs {
            pairs: flags.pairs,
            testnet,
            interval_secs: flags.interval,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Serve { .. } => helmsman_log::init(),
        Commands::Menu => helmsman_log::init_file("menu"),
        _ => helmsman_log::init_for("helmsman_cli"),
    }

    let store = TokenStore::default_location()?;
    let server = cli.server;
    debug!(server = %server, session_file = %store.path().display(), "CLI context");

    match cli.command {
        Commands::Serve { host, port, config } => run_serve(host, port, config).await,
        Commands::Login { username, password } => {
            run_login(&server, &store, username, password).await
        }
        Commands::Logout => run_logout(&server, &store).await,
        Commands::Whoami => run_whoami(&server, &store).await,
        Commands::Start { mode, args } => {
            let client = client_for(&server, &store)?;
            let handle = client.start(mode, &args.into()).await?;
            render::print_handle(&handle);
            Ok(())
        }
        Commands::Stop { mode, force } => {
            let client = client_for(&server, &store)?;
            let ack = client.stop(mode, !force).await?;
            render::print_stop(&ack);
            Ok(())
        }
        Commands::Restart { mode, args } => {
            let client = client_for(&server, &store)?;
            let handle = client.restart(mode, &args.into()).await?;
            render::print_handle(&handle);
            Ok(())
        }
        Commands::Status { mode } => {
            let client = client_for(&server, &store)?;
            let handles = match mode {
                Some(mode) => client.status(mode).await?.into_iter().collect(),
                None => client.status_all().await?,
            };
            render::print_handles(&handles);
            Ok(())
        }
        Commands::Logs { mode, lines } => {
            let client = client_for(&server, &store)?;
            for line in client.logs(mode, Some(lines)).await? {
                println!("{}", line);
            }
            Ok(())
        }
        Commands::Modes => {
            let client = client_for(&server, &store)?;
            render::print_modes(&client.modes().await?);
            Ok(())
        }
        Commands::Menu => run_menu(&server, &store).await,
        Commands::Check { config } => run_check(config),
    }
}

async fn run_serve(host: Option<String>, port: Option<u16>, config: Option<PathBuf>) -> Result<()> {
    let mut settings = Config::load_or_default(config.as_deref())?;
    if let Some(host) = host {
        settings.server.host = host;
    }
    if let Some(port) = port {
        settings.server.port = port;
    }
    helmsman_serve::run(settings.into()).await
}

async fn run_login(
    server: &str,
    store: &TokenStore,
    username: Option<String>,
    password: Option<String>,
) -> Result<()> {
    let username = match username {
        Some(username) => username,
        None => Input::new()
            .with_prompt("Username")
            .default("admin".to_string())
            .interact_text()
            .context("Failed to read username")?,
    };
    let password = match password {
        Some(password) => password,
        None => Password::new()
            .with_prompt("Password")
            .interact()
            .context("Failed to read password")?,
    };

    let mut client = helmsman_client::ControlClient::new(server)?;
    let session = client.login(&username, &password).await?;
    store.save(&StoredSession {
        server: server.to_string(),
        username: session.username.clone(),
        token: session.token,
        expires_at: session.expires_at,
    })?;

    println!(
        "{} {} {}",
        "Logged in as".green(),
        session.username.bold(),
        format!("(until {})", session.expires_at.format("%Y-%m-%d %H:%M UTC")).dimmed()
    );
    Ok(())
}

async fn run_logout(server: &str, store: &TokenStore) -> Result<()> {
    let mut client = client_for(server, store)?;
    if client.token().is_some() {
        client.logout().await?;
    }
    store.clear()?;
    println!("{}", "Logged out".green());
    Ok(())
}

async fn run_whoami(server: &str, store: &TokenStore) -> Result<()> {
    let client = client_for(server, store)?;
    let username = store.load()?.map(|s| s.username);
    if client.is_authenticated().await? {
        println!(
            "{} {}",
            "Authenticated as".green(),
            username.unwrap_or_default().bold()
        );
        Ok(())
    } else {
        bail!("Not authenticated, run `helmsman login`");
    }
}

async fn run_menu(server: &str, store: &TokenStore) -> Result<()> {
    menu::print_menu();
    let choice: String = Input::new()
        .with_prompt(format!("Choose an option (0-{})", RunMode::ALL.len()))
        .allow_empty(true)
        .interact_text()
        .context("Failed to read menu choice")?;

    let mode = match menu::parse_choice(&choice)? {
        menu::MenuChoice::Exit => {
            println!("Bye");
            return Ok(());
        }
        menu::MenuChoice::Launch(mode) => menu::supervised(mode)?,
    };

    let mut args = BotArgs::default();
    if let Some(defaults) = mode.default_args() {
        let pairs: String = Input::new()
            .with_prompt(format!(
                "How many pairs to trade? (default {})",
                defaults.pairs.unwrap_or_default()
            ))
            .allow_empty(true)
            .interact_text()
            .context("Failed to read pair count")?;
        args = menu::parse_pairs(&pairs)?;
    }

    let client = client_for(server, store)?;
    let handle = client.start(mode, &args).await?;
    println!();
    render::print_handle(&handle);
    Ok(())
}

fn run_check(config: Option<PathBuf>) -> Result<()> {
    let settings = Config::load_or_default(config.as_deref())?;
    let report = check::run_checks(&settings, std::env::var_os("PATH"))?;

    println!("{}", "System check".bold());
    println!();
    report.print();
    println!();

    if report.passed() {
        println!("{}", "All dependencies present".green());
        Ok(())
    } else {
        bail!("{} runtime dependencies missing", report.missing());
    }
}
