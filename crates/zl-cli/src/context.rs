//! Wiring of the orchestrator for one CLI invocation

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result};

use zl_core::config::{self, ClientConfig};
use zl_core::Session;
use zl_orchestrator::{JsonFileStore, SessionOrchestrator};
use zl_remote::{HttpProbe, SshConnector};

/// Resolved configuration and file locations
pub struct AppContext {
    pub config: ClientConfig,
    pub config_path: PathBuf,
    pub sessions_path: PathBuf,
}

impl AppContext {
    /// Load the client config from `config_path` (or the default location).
    ///
    /// The session file lives next to the config file.
    pub fn load(config_path: Option<PathBuf>) -> Result<Self> {
        let config_path = config_path.unwrap_or_else(config::default_config_path);
        let config: ClientConfig = config::load_config_or_default(&config_path)
            .with_context(|| format!("Failed to load config from {:?}", config_path))?;

        let sessions_path = config_path
            .parent()
            .map(|dir| dir.join("sessions.json"))
            .unwrap_or_else(config::default_sessions_path);

        Ok(Self {
            config,
            config_path,
            sessions_path,
        })
    }

    /// Build an orchestrator backed by SSH, the HTTPS probe and the JSON store
    pub fn orchestrator(&self) -> Result<SessionOrchestrator> {
        let store = Arc::new(JsonFileStore::new(self.sessions_path.clone()));
        let connector = Arc::new(SshConnector::new(self.config.ssh.clone()));
        let probe = Arc::new(HttpProbe::new());

        SessionOrchestrator::new(self.config.clone(), store, connector, probe)
            .with_context(|| format!("Failed to load sessions from {:?}", self.sessions_path))
    }
}

/// Find a session by id, id prefix, title or remote session name
pub async fn resolve_session(orchestrator: &SessionOrchestrator, query: &str) -> Result<Session> {
    orchestrator
        .find(query)
        .await
        .with_context(|| format!("No session matches '{}'. Run 'zelland list' to see sessions", query))
}
