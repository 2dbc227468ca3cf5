//! Core error types for Zelland

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use zl_protocol::ProtocolError;

/// Top-level error type for the Zelland crates
#[derive(Error, Debug)]
pub enum ZlError {
    /// Protocol error
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Remote command channel error
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    /// Remote service error
    #[error("Service error: {0}")]
    Service(#[from] ServiceError),

    /// Session error
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Session store error
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by the remote command channel
#[derive(Error, Debug)]
pub enum ChannelError {
    /// Credentials were rejected by the remote host
    #[error("Authentication failed for {principal}@{host}")]
    AuthFailed { principal: String, host: String },

    /// The host could not be dialed
    #[error("Network unreachable: {0}")]
    NetworkUnreachable(String),

    /// An operation did not complete in time
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// No live connection
    #[error("Not connected")]
    NotConnected,

    /// Key material could not be loaded
    #[error("Failed to load key {path}: {message}")]
    Key { path: PathBuf, message: String },

    /// Configuration is missing credentials required by its auth mode
    #[error("Invalid connection config: {0}")]
    InvalidConfig(String),

    /// Protocol-level SSH failure after the connection was established
    #[error("SSH error: {0}")]
    Ssh(String),
}

/// Errors raised while managing the remote multiplexing service
#[derive(Error, Debug)]
pub enum ServiceError {
    /// The service binary is absent on the remote host
    #[error("{0}")]
    NotInstalled(String),

    /// The service did not come up, or its token could not be extracted
    #[error("{0}")]
    StartupFailed(String),

    /// Reserved: the installed version cannot serve web clients
    #[error("{0}")]
    VersionTooOld(String),

    /// Transport failure underneath a service operation
    #[error(transparent)]
    Channel(#[from] ChannelError),
}

/// Session-related errors
#[derive(Error, Debug)]
pub enum SessionError {
    /// Session not found
    #[error("Session not found: {0}")]
    NotFound(String),

    /// A session for the same host and remote session already exists
    #[error("Session '{name}' on {host} already exists")]
    DuplicateSession { host: String, name: String },

    /// The submitted configuration is invalid
    #[error(transparent)]
    InvalidConfig(#[from] ConfigError),

    /// Direct-mode endpoint did not answer
    #[error("Could not reach server at {0}")]
    Unreachable(String),

    /// The flow was superseded by a newer request on the same session
    #[error("Superseded by a newer request")]
    Cancelled,

    /// Remote service failure
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// Remote channel failure
    #[error(transparent)]
    Channel(#[from] ChannelError),

    /// Persisting the session collection failed
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Session store errors
#[derive(Error, Debug)]
pub enum StoreError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encode/decode error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialize error
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Missing required field
    #[error("{0} cannot be empty")]
    MissingField(&'static str),
}
