// ABOUTME: CLI library components for the helmsman binary.
// ABOUTME: System check, launcher menu and terminal rendering shared by subcommands.

//! # helmsman-cli
//!
//! The `helmsman` binary: runs the control server and acts as the operator's
//! client for it.
//!
//! ```text
//! helmsman
//! ├── serve                         # Run the Control API
//! ├── login / logout / whoami       # Manage the local session
//! ├── start <mode>                  # Launch a run mode
//! ├── stop <mode>                   # Stop it (graceful unless --force)
//! ├── restart <mode>
//! ├── status [mode]                 # Process snapshots
//! ├── logs <mode>                   # Captured output
//! ├── modes                         # Mode catalogue
//! ├── menu                          # Quick-start launcher menu
//! └── check                         # Interpreter and entrypoint check
//! ```

pub mod check;
pub mod menu;
pub mod render;

use anyhow::Result;
use helmsman_client::{ControlClient, TokenStore};

/// Version of the helmsman CLI
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Client for `server` carrying the stored session token, if one is saved.
pub fn client_for(server: &str, store: &TokenStore) -> Result<ControlClient> {
    let client = ControlClient::new(server)?;
    Ok(match store.token_for(server)? {
        Some(token) => client.with_token(token),
        None => client,
    })
}
