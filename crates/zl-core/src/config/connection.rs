//! Per-host connection configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::ConfigError;

/// How the client authenticates the remote-command channel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    /// Password authentication
    #[default]
    Secret,
    /// Private key file, optionally passphrase-protected
    KeyFile,
}

/// How a session reaches the remote multiplexing service
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectMode {
    /// The service is assumed to be running; only probe its HTTPS endpoint
    Direct,
    /// Log in over SSH, start the service if needed and mint a token
    #[default]
    Bootstrap,
}

/// Everything needed to reach one remote host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Stable identifier of this configuration
    pub id: String,

    /// Display name (falls back to the host when blank)
    #[serde(default)]
    pub name: String,

    /// Target host name or address
    pub host: String,

    /// SSH port
    #[serde(default = "default_ssh_port")]
    pub port: u16,

    /// Username for the remote shell
    pub principal: String,

    /// Authentication mode
    #[serde(default)]
    pub auth: AuthMode,

    /// Password, required for [`AuthMode::Secret`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,

    /// Private key path, required for [`AuthMode::KeyFile`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_path: Option<PathBuf>,

    /// Passphrase for the private key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_passphrase: Option<String>,

    /// Whether the secret and passphrase may be written to disk
    #[serde(default)]
    pub persist_secret: bool,

    /// Requested remote multiplexer session name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_session: Option<String>,

    /// Companion daemon port (control channel)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub daemon_port: Option<u16>,

    /// Pre-shared key for the control channel
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub daemon_psk: Option<String>,

    /// Connect flow used for this host
    #[serde(default)]
    pub mode: ConnectMode,
}

fn default_ssh_port() -> u16 {
    22
}

fn is_blank(value: Option<&str>) -> bool {
    value.map(|v| v.trim().is_empty()).unwrap_or(true)
}

impl ConnectionConfig {
    /// Create a password-authenticated config for `host` as the current user
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: String::new(),
            host: host.into(),
            port: default_ssh_port(),
            principal: whoami::username(),
            auth: AuthMode::Secret,
            secret: None,
            key_path: None,
            key_passphrase: None,
            persist_secret: false,
            remote_session: None,
            daemon_port: None,
            daemon_psk: None,
            mode: ConnectMode::default(),
        }
    }

    /// Name shown to the user
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            &self.host
        } else {
            &self.name
        }
    }

    /// Check that the credentials required by the auth mode are present.
    ///
    /// Other fields are not inspected; see [`Self::validate_strict`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.auth {
            AuthMode::Secret if is_blank(self.secret.as_deref()) => {
                Err(ConfigError::MissingField("Password"))
            }
            AuthMode::KeyFile
                if is_blank(self.key_path.as_ref().and_then(|p| p.to_str())) =>
            {
                Err(ConfigError::MissingField("Private key path"))
            }
            _ => Ok(()),
        }
    }

    /// Full validation applied to configs submitted by the user
    pub fn validate_strict(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::MissingField("Host"));
        }
        if self.principal.trim().is_empty() {
            return Err(ConfigError::MissingField("Username"));
        }
        if self.port == 0 {
            return Err(ConfigError::Invalid("Invalid port number".to_string()));
        }
        self.validate()
    }

    /// Copy suitable for persisting: credentials are dropped unless the
    /// user opted in with `persist_secret`
    pub fn for_storage(&self) -> Self {
        let mut stored = self.clone();
        if !self.persist_secret {
            stored.secret = None;
            stored.key_passphrase = None;
        }
        stored
    }
}
