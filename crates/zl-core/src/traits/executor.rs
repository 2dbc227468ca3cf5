//! Remote command execution traits

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::config::ConnectionConfig;
use crate::error::ChannelError;
use crate::types::CommandResult;

/// Something that can run shell commands on a remote host
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Run `command` and collect its output.
    ///
    /// A non-zero exit status is a successful call with `success == false`.
    /// Errors are reserved for transport failures and blown timeouts.
    async fn execute(&self, command: &str, timeout: Duration)
        -> Result<CommandResult, ChannelError>;

    /// Whether `name` resolves on the remote `PATH`
    async fn exists(&self, name: &str, timeout: Duration) -> bool {
        match self.execute(&format!("which {}", name), timeout).await {
            Ok(result) => result.success && !result.stdout.trim().is_empty(),
            Err(e) => {
                tracing::debug!("which {} failed: {}", name, e);
                false
            }
        }
    }
}

/// A connected remote shell owned by one connect flow
#[async_trait]
pub trait RemoteShell: CommandExecutor {
    /// Close the connection. Safe to call any number of times.
    async fn disconnect(&self);

    /// Whether a live connection is held
    async fn is_connected(&self) -> bool;
}

/// Opens remote shells for connection configs
#[async_trait]
pub trait ShellConnector: Send + Sync {
    async fn open(&self, config: &ConnectionConfig) -> Result<Arc<dyn RemoteShell>, ChannelError>;
}
