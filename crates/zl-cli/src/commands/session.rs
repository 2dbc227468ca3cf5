//! Connect, disconnect, kill and remove commands

use anyhow::Result;
use tokio::sync::watch;

use zl_core::config::ConnectionConfig;
use zl_core::{ConnectionStatus, Session};
use zl_orchestrator::SessionOrchestrator;

use crate::context::resolve_session;
use crate::output::{format_status, print_error, print_info, print_success, print_warning};

/// Credentials supplied on the command line for sessions whose secrets
/// were not persisted
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub password: Option<String>,
    pub passphrase: Option<String>,
}

impl Credentials {
    pub fn is_empty(&self) -> bool {
        self.password.is_none() && self.passphrase.is_none()
    }

    /// Overlay these credentials on a config
    pub fn apply(&self, config: &mut ConnectionConfig) {
        if let Some(password) = &self.password {
            config.secret = Some(password.clone());
        }
        if let Some(passphrase) = &self.passphrase {
            config.key_passphrase = Some(passphrase.clone());
        }
    }
}

async fn prepare(
    orchestrator: &SessionOrchestrator,
    query: &str,
    credentials: &Credentials,
) -> Result<Session> {
    let session = resolve_session(orchestrator, query).await?;
    if credentials.is_empty() {
        return Ok(session);
    }
    Ok(orchestrator
        .update_credentials(
            &session.id,
            credentials.password.clone(),
            credentials.passphrase.clone(),
        )
        .await?)
}

fn report(status: &mut watch::Receiver<ConnectionStatus>) {
    let current = status.borrow_and_update().clone();
    match current {
        ConnectionStatus::Connecting(_) => print_info(&format_status(&current)),
        _ => tracing::debug!("{}", format_status(&current)),
    }
}

/// Run the connect flow and print the session URL
pub async fn connect_command(
    orchestrator: &SessionOrchestrator,
    query: &str,
    credentials: &Credentials,
) -> Result<()> {
    let session = prepare(orchestrator, query, credentials).await?;
    orchestrator.select(&session.id).await?;

    let mut status = orchestrator.subscribe_status();
    let mut flow = orchestrator.spawn_connect(session.id.clone());

    let result = loop {
        tokio::select! {
            changed = status.changed() => {
                if changed.is_ok() {
                    report(&mut status);
                }
            }
            joined = &mut flow => break joined?,
            _ = tokio::signal::ctrl_c() => {
                print_warning("Interrupted, cancelling");
                orchestrator.shutdown().await;
                flow.abort();
                anyhow::bail!("Connect to {} cancelled", session.display_name());
            }
        }
    };

    match result {
        Ok(connected) => {
            print_success(&format_status(&orchestrator.status()));
            if let Some(url) = &connected.url {
                println!("{}", url);
            }
            Ok(())
        }
        Err(e) => {
            print_error(&e.to_string());
            anyhow::bail!("Failed to connect {}", session.display_name())
        }
    }
}

/// Close the session's connection, leaving the remote service running
pub async fn disconnect_command(orchestrator: &SessionOrchestrator, query: &str) -> Result<()> {
    let session = resolve_session(orchestrator, query).await?;
    orchestrator.disconnect_session(&session.id).await?;
    print_success(&format!("Disconnected {}", session.display_name()));
    Ok(())
}

/// Stop the remote service and disconnect
pub async fn kill_command(
    orchestrator: &SessionOrchestrator,
    query: &str,
    credentials: &Credentials,
) -> Result<()> {
    let session = prepare(orchestrator, query, credentials).await?;
    orchestrator.kill_session(&session.id).await?;
    print_success(&format!("Killed {}", session.display_name()));
    Ok(())
}

/// Disconnect and delete a session
pub async fn remove_command(orchestrator: &SessionOrchestrator, query: &str) -> Result<()> {
    let session = resolve_session(orchestrator, query).await?;
    let removed = orchestrator.remove_session(&session.id).await?;
    print_success(&format!("Removed {}", removed.display_name()));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_overlay() {
        let mut config = ConnectionConfig::new("devbox");
        config.secret = Some("old".to_string());

        Credentials::default().apply(&mut config);
        assert_eq!(config.secret.as_deref(), Some("old"));

        let credentials = Credentials {
            password: Some("new".to_string()),
            passphrase: None,
        };
        credentials.apply(&mut config);
        assert_eq!(config.secret.as_deref(), Some("new"));
        assert!(config.key_passphrase.is_none());
    }
}
