//! Opens SSH command channels for the orchestrator

use std::sync::Arc;

use async_trait::async_trait;

use zl_core::config::{ConnectionConfig, SshConfig};
use zl_core::error::ChannelError;
use zl_core::traits::{RemoteShell, ShellConnector};

use super::SshCommandChannel;

/// [`ShellConnector`] producing connected [`SshCommandChannel`]s
pub struct SshConnector {
    settings: SshConfig,
}

impl SshConnector {
    pub fn new(settings: SshConfig) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl ShellConnector for SshConnector {
    async fn open(&self, config: &ConnectionConfig) -> Result<Arc<dyn RemoteShell>, ChannelError> {
        let channel = SshCommandChannel::new(self.settings.clone());
        channel.connect(config).await?;
        Ok(Arc::new(channel))
    }
}
