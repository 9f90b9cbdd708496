// ABOUTME: Shared state handed to every Control API handler.
// ABOUTME: Built once from configuration; cloning shares the same managers.

use anyhow::{Context, Result};
use helmsman_auth::{CredentialStore, SessionManager, SessionSettings};
use helmsman_core::Config;
use helmsman_supervisor::{ProcessSupervisor, SupervisorOptions};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionManager>,
    pub supervisor: Arc<ProcessSupervisor>,
}

impl AppState {
    pub fn new(sessions: SessionManager, supervisor: ProcessSupervisor) -> Self {
        Self {
            sessions: Arc::new(sessions),
            supervisor: Arc::new(supervisor),
        }
    }

    /// Build the credential store, session manager and supervisor from `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let credentials =
            CredentialStore::from_settings(&config.auth).context("loading operator credential")?;
        let sessions = SessionManager::new(credentials, SessionSettings::from(&config.auth));

        let catalogue = config.catalogue().context("building mode catalogue")?;
        let supervisor =
            ProcessSupervisor::new(catalogue, SupervisorOptions::from(&config.supervisor));

        Ok(Self::new(sessions, supervisor))
    }
}
