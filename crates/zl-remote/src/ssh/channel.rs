//! One SSH connection executing one-shot commands

use std::net::Ipv4Addr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use russh::client::{self, Handle, Msg};
use russh::{Channel, ChannelMsg, Disconnect};
use tokio::sync::Mutex;

use zl_core::config::{AuthMode, ConnectionConfig, SshConfig};
use zl_core::error::ChannelError;
use zl_core::traits::{CommandExecutor, RemoteShell};
use zl_core::CommandResult;

use super::handler::ClientHandler;

/// Extended data stream number carrying stderr
const SSH_EXTENDED_DATA_STDERR: u32 = 1;

/// Rewrite a loopback host to `alias`, leaving every other host untouched
pub fn rewrite_loopback(host: &str, alias: Option<&str>) -> String {
    let is_loopback = host.eq_ignore_ascii_case("localhost")
        || host
            .parse::<Ipv4Addr>()
            .map(|ip| ip.is_loopback())
            .unwrap_or(false)
        || host == "::1";

    match alias {
        Some(alias) if is_loopback => alias.to_string(),
        _ => host.to_string(),
    }
}

struct LiveConnection {
    handle: Handle<ClientHandler>,
    config: ConnectionConfig,
}

/// Remote command channel over a single SSH connection.
///
/// Holds at most one live connection. Every [`execute`](CommandExecutor::execute)
/// opens its own session channel on that connection.
pub struct SshCommandChannel {
    settings: SshConfig,
    live: Mutex<Option<LiveConnection>>,
}

impl SshCommandChannel {
    pub fn new(settings: SshConfig) -> Self {
        Self {
            settings,
            live: Mutex::new(None),
        }
    }

    /// Connect and authenticate, closing any connection already held
    pub async fn connect(&self, config: &ConnectionConfig) -> Result<(), ChannelError> {
        config
            .validate()
            .map_err(|e| ChannelError::InvalidConfig(e.to_string()))?;

        let mut live = self.live.lock().await;
        if let Some(prior) = live.take() {
            tracing::debug!("Closing previous connection to {}", prior.config.host);
            close(prior.handle).await;
        }

        let host = rewrite_loopback(&config.host, self.settings.loopback_alias.as_deref());
        let addr = format!("{}:{}", host, config.port);
        tracing::debug!("Connecting to {} as {}", addr, config.principal);

        let ssh_config = Arc::new(client::Config::default());
        let handler = ClientHandler::new(host.clone());

        let mut handle = tokio::time::timeout(
            self.settings.connect_timeout,
            client::connect(ssh_config, addr.as_str(), handler),
        )
        .await
        .map_err(|_| ChannelError::Timeout(self.settings.connect_timeout))?
        .map_err(|e| ChannelError::NetworkUnreachable(format!("{}: {}", addr, e)))?;

        let authenticated = tokio::time::timeout(
            self.settings.connect_timeout,
            authenticate(&mut handle, config),
        )
        .await
        .map_err(|_| ChannelError::Timeout(self.settings.connect_timeout))??;

        if !authenticated {
            close(handle).await;
            return Err(ChannelError::AuthFailed {
                principal: config.principal.clone(),
                host: config.host.clone(),
            });
        }

        tracing::info!("Connected to {} as {}", addr, config.principal);
        *live = Some(LiveConnection {
            handle,
            config: config.clone(),
        });
        Ok(())
    }

    /// Config of the live connection, if any
    pub async fn config(&self) -> Option<ConnectionConfig> {
        self.live.lock().await.as_ref().map(|l| l.config.clone())
    }

    async fn open_channel(&self) -> Result<Channel<Msg>, ChannelError> {
        let live = self.live.lock().await;
        let live = live.as_ref().ok_or(ChannelError::NotConnected)?;
        live.handle
            .channel_open_session()
            .await
            .map_err(|e| ChannelError::Ssh(e.to_string()))
    }
}

async fn authenticate(
    handle: &mut Handle<ClientHandler>,
    config: &ConnectionConfig,
) -> Result<bool, ChannelError> {
    match config.auth {
        AuthMode::Secret => {
            let secret = config.secret.as_deref().unwrap_or_default();
            handle
                .authenticate_password(&config.principal, secret)
                .await
                .map_err(|e| ChannelError::Ssh(e.to_string()))
        }
        AuthMode::KeyFile => {
            let path = config
                .key_path
                .as_deref()
                .ok_or_else(|| ChannelError::InvalidConfig("missing key path".to_string()))?;
            let key = load_key(path, config.key_passphrase.as_deref())?;
            handle
                .authenticate_publickey(&config.principal, Arc::new(key))
                .await
                .map_err(|e| ChannelError::Ssh(e.to_string()))
        }
    }
}

fn load_key(path: &Path, passphrase: Option<&str>) -> Result<russh_keys::key::KeyPair, ChannelError> {
    let passphrase = passphrase.filter(|p| !p.is_empty());
    russh_keys::load_secret_key(path, passphrase).map_err(|e| ChannelError::Key {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

async fn close(handle: Handle<ClientHandler>) {
    if let Err(e) = handle
        .disconnect(Disconnect::ByApplication, "", "en")
        .await
    {
        tracing::debug!("Error while disconnecting: {}", e);
    }
}

async fn collect_output(
    mut channel: Channel<Msg>,
    command: &str,
) -> Result<CommandResult, ChannelError> {
    channel
        .exec(true, command)
        .await
        .map_err(|e| ChannelError::Ssh(e.to_string()))?;

    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let mut exit_code = -1;

    while let Some(msg) = channel.wait().await {
        match msg {
            ChannelMsg::Data { ref data } => stdout.extend_from_slice(data),
            ChannelMsg::ExtendedData { ref data, ext } if ext == SSH_EXTENDED_DATA_STDERR => {
                stderr.extend_from_slice(data)
            }
            ChannelMsg::ExitStatus { exit_status } => exit_code = exit_status as i32,
            ChannelMsg::Close => break,
            _ => {}
        }
    }

    Ok(CommandResult::new(
        exit_code,
        String::from_utf8_lossy(&stdout),
        String::from_utf8_lossy(&stderr),
    ))
}

#[async_trait]
impl CommandExecutor for SshCommandChannel {
    async fn execute(
        &self,
        command: &str,
        timeout: Duration,
    ) -> Result<CommandResult, ChannelError> {
        tracing::debug!("Executing: {}", command);
        let result = tokio::time::timeout(timeout, async {
            let channel = self.open_channel().await?;
            collect_output(channel, command).await
        })
        .await
        .map_err(|_| ChannelError::Timeout(timeout))??;

        tracing::debug!("Exit code {} for: {}", result.exit_code, command);
        Ok(result)
    }
}

#[async_trait]
impl RemoteShell for SshCommandChannel {
    async fn disconnect(&self) {
        if let Some(live) = self.live.lock().await.take() {
            tracing::debug!("Disconnecting from {}", live.config.host);
            close(live.handle).await;
        }
    }

    async fn is_connected(&self) -> bool {
        self.live
            .lock()
            .await
            .as_ref()
            .map(|l| !l.handle.is_closed())
            .unwrap_or(false)
    }
}
