//! Core domain types

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::ConnectionConfig;

/// Unique identifier for a configured session
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Create a session ID from an existing string
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random session ID
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Get the raw ID string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First eight characters, used for display and synthesized names
    pub fn short(&self) -> &str {
        let end = self
            .0
            .char_indices()
            .nth(8)
            .map(|(i, _)| i)
            .unwrap_or(self.0.len());
        &self.0[..end]
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Current phase of the orchestrator, as seen by observers.
///
/// Only one status is current at a time; each transition overwrites it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionStatus {
    /// A connect flow is running for the labelled session
    Connecting(String),
    /// The labelled session is connected
    Connected(String),
    /// The last flow failed
    Error(String),
    /// Nothing is connected
    #[default]
    Disconnected,
}

impl ConnectionStatus {
    /// Whether the status represents a failure
    pub fn is_error(&self) -> bool {
        matches!(self, ConnectionStatus::Error(_))
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionStatus::Connecting(label) => write!(f, "connecting to {}", label),
            ConnectionStatus::Connected(label) => write!(f, "{}", label),
            ConnectionStatus::Error(message) => write!(f, "error: {}", message),
            ConnectionStatus::Disconnected => write!(f, "disconnected"),
        }
    }
}

/// Outcome of a side-effect-free connection test
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestOutcome {
    Success(String),
    Error(String),
}

impl TestOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TestOutcome::Success(_))
    }

    pub fn message(&self) -> &str {
        match self {
            TestOutcome::Success(m) | TestOutcome::Error(m) => m,
        }
    }
}

/// Result of one remote command invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    /// Exit status reported by the remote shell (-1 if none was reported)
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    /// `exit_code == 0`
    pub success: bool,
}

impl CommandResult {
    pub fn new(exit_code: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: stdout.into(),
            stderr: stderr.into(),
            success: exit_code == 0,
        }
    }

    /// Stdout if it has content, stderr otherwise
    pub fn output(&self) -> &str {
        if self.stdout.is_empty() {
            &self.stderr
        } else {
            &self.stdout
        }
    }
}

/// A configured remote terminal session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub title: String,
    pub config: ConnectionConfig,

    /// Name of the remote multiplexer session. Stable across reconnects,
    /// which is what lets the client resume the same remote workspace.
    pub remote_session: String,

    #[serde(default)]
    pub connected: bool,

    /// URL the terminal surface should load while connected
    #[serde(default)]
    pub url: Option<String>,

    /// Last token minted by the remote service, kept for direct reconnects
    #[serde(default)]
    pub last_token: Option<String>,

    /// Milliseconds since the Unix epoch of the last successful connect
    #[serde(default)]
    pub last_connected: Option<u64>,
}

impl Session {
    /// Copy suitable for persisting.
    ///
    /// Unless the config opted in with `persist_secret`, credentials are
    /// dropped together with the last service token and any URL carrying it.
    pub fn for_storage(&self) -> Self {
        let mut stored = self.clone();
        stored.config = self.config.for_storage();
        if !self.config.persist_secret {
            stored.last_token = None;
            if stored.url.as_deref().is_some_and(|url| url.contains("token=")) {
                stored.url = None;
            }
        }
        stored
    }

    /// Title followed by the host, e.g. `"work (devbox)"`
    pub fn display_name(&self) -> String {
        format!("{} ({})", self.title, self.config.host)
    }

    pub fn status_text(&self) -> &'static str {
        if self.connected {
            "Connected"
        } else if self.last_connected.is_some() {
            "Disconnected"
        } else {
            "Not connected"
        }
    }

    /// Whether this session matches an id, id prefix, title or remote session name
    pub fn matches(&self, query: &str) -> bool {
        self.id.as_str() == query
            || (query.len() >= 4 && self.id.as_str().starts_with(query))
            || self.title == query
            || self.remote_session == query
    }
}
