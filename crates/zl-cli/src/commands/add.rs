//! Add command implementation

use std::path::PathBuf;

use anyhow::Result;

use zl_core::config::{AuthMode, ConnectMode, ConnectionConfig};
use zl_orchestrator::SessionOrchestrator;

use crate::output::{print_info, print_success, print_warning};

/// Options collected by `zelland add`
#[derive(Debug, Clone, Default)]
pub struct AddArgs {
    pub host: String,
    pub name: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub key: Option<PathBuf>,
    pub passphrase: Option<String>,
    pub session: Option<String>,
    pub mode: Option<ConnectMode>,
    pub save_secret: bool,
    pub daemon_port: Option<u16>,
    pub psk: Option<String>,
}

impl AddArgs {
    /// Build the connection config these options describe
    pub fn to_config(&self) -> ConnectionConfig {
        let mut config = ConnectionConfig::new(self.host.trim());
        if let Some(name) = &self.name {
            config.name = name.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(user) = &self.user {
            config.principal = user.clone();
        }
        if let Some(key) = &self.key {
            config.auth = AuthMode::KeyFile;
            config.key_path = Some(key.clone());
            config.key_passphrase = self.passphrase.clone();
        }
        config.secret = self.password.clone();
        config.remote_session = self.session.clone();
        config.mode = self.mode.unwrap_or_default();
        config.persist_secret = self.save_secret;
        config.daemon_port = self.daemon_port;
        config.daemon_psk = self.psk.clone();
        config
    }
}

/// Execute the add command
pub async fn add_command(orchestrator: &SessionOrchestrator, args: &AddArgs) -> Result<()> {
    let session = orchestrator.add_session(args.to_config()).await?;

    print_success(&format!(
        "Added {} [{}] as remote session '{}'",
        session.display_name(),
        session.id.short(),
        session.remote_session
    ));

    let has_secret = session.config.secret.is_some() || session.config.key_passphrase.is_some();
    if has_secret && !session.config.persist_secret {
        print_warning("Credentials were not saved; pass --password (or --passphrase) when connecting");
    }
    print_info(&format!("Connect with: zelland connect {}", session.id.short()));

    Ok(())
}
