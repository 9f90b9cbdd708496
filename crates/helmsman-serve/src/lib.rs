// ABOUTME: Control API server for helmsman: login gate plus bot lifecycle routes
// ABOUTME: Every mutating route validates the session before touching the supervisor

pub mod error;
pub mod server;
pub mod services;
pub mod state;

use anyhow::Result;
use helmsman_core::Config;

pub use error::ApiError;
pub use services::router;
pub use state::AppState;

/// Configuration for the Control API server
#[derive(Debug, Clone, Default)]
pub struct ServeConfig {
    /// Listen address override (default: `[server] host:port`)
    pub addr: Option<String>,
    /// Loaded helmsman configuration
    pub settings: Config,
}

impl ServeConfig {
    pub fn listen_addr(&self) -> String {
        self.addr
            .clone()
            .unwrap_or_else(|| self.settings.server.addr())
    }
}

impl From<Config> for ServeConfig {
    fn from(settings: Config) -> Self {
        Self {
            addr: None,
            settings,
        }
    }
}

/// Run the Control API server until Ctrl+C or SIGTERM
pub async fn run(config: ServeConfig) -> Result<()> {
    server::run(config).await
}
