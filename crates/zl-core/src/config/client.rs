//! Client-wide settings: timeouts, remote service knobs, probe and control channel

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::serde_utils::{duration_millis, duration_secs};

/// Top-level client configuration (`config.toml`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Remote command channel settings
    pub ssh: SshConfig,
    /// Remote multiplexing service settings
    pub service: ServiceConfig,
    /// Direct-mode reachability probe settings
    pub probe: ProbeConfig,
    /// Companion daemon control channel settings
    pub control: ControlConfig,
}

/// Remote command channel settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SshConfig {
    /// Dial and authentication budget
    #[serde(with = "duration_secs")]
    pub connect_timeout: Duration,

    /// Default budget for a single remote command
    #[serde(with = "duration_secs")]
    pub command_timeout: Duration,

    /// Budget for cheap probing commands (`which`, `--version`, `pgrep`)
    #[serde(with = "duration_secs")]
    pub probe_command_timeout: Duration,

    /// Address that loopback hosts are rewritten to, when running inside a
    /// VM or container whose host is reachable through an alias
    pub loopback_alias: Option<String>,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            command_timeout: Duration::from_secs(30),
            probe_command_timeout: Duration::from_secs(5),
            loopback_alias: Some("10.0.2.2".to_string()),
        }
    }
}

/// Which token extraction strategy to apply to `--create-token` output
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenParser {
    /// Strip ANSI codes, then look for the labelled token, a UUID, or a long line
    #[default]
    Strict,
    /// Whole trimmed output is the token
    Legacy,
}

/// Remote multiplexing service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Binary name on the remote host
    pub binary: String,

    /// Port the web service listens on
    pub default_port: u16,

    /// Remote log file; defaults to `/tmp/<binary>-web.log`
    pub log_path: Option<PathBuf>,

    /// Wait after launching before the first liveness poll
    #[serde(with = "duration_millis")]
    pub settle_delay: Duration,

    /// Liveness polls after launch
    pub poll_attempts: u32,

    /// Delay between liveness polls
    #[serde(with = "duration_millis")]
    pub poll_interval: Duration,

    /// Wait after `pkill` before re-checking
    #[serde(with = "duration_millis")]
    pub stop_grace: Duration,

    /// Lines of the remote log included in startup errors
    pub log_tail_lines: usize,

    /// Token extraction strategy
    pub token_parser: TokenParser,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            binary: "zellij".to_string(),
            default_port: 8082,
            log_path: None,
            settle_delay: Duration::from_millis(2000),
            poll_attempts: 5,
            poll_interval: Duration::from_millis(500),
            stop_grace: Duration::from_millis(500),
            log_tail_lines: 20,
            token_parser: TokenParser::Strict,
        }
    }
}

impl ServiceConfig {
    /// Effective remote log path
    pub fn log_path(&self) -> String {
        match &self.log_path {
            Some(path) => path.display().to_string(),
            None => format!("/tmp/{}-web.log", self.binary),
        }
    }
}

/// Direct-mode reachability probe settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// HTTPS port the service is expected on
    pub port: u16,

    /// Probe budget
    #[serde(with = "duration_millis")]
    pub timeout: Duration,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            port: 8082,
            timeout: Duration::from_millis(2000),
        }
    }
}

/// Companion daemon control channel settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    /// Daemon port when a session does not name one
    pub port: u16,

    /// Use `wss://` instead of `ws://`
    pub secure: bool,

    /// Delay before the single reconnect attempt after an unsolicited close
    #[serde(with = "duration_secs")]
    pub reconnect_delay: Duration,

    /// Transport-level ping interval
    #[serde(with = "duration_secs")]
    pub keepalive_interval: Duration,

    /// Handshake budget
    #[serde(with = "duration_secs")]
    pub connect_timeout: Duration,

    /// Request header carrying the pre-shared key
    pub psk_header: String,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            port: 8083,
            secure: false,
            reconnect_delay: Duration::from_secs(5),
            keepalive_interval: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            psk_header: "X-Zelland-PSK".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_log_path_follows_binary() {
        let mut service = ServiceConfig::default();
        assert_eq!(service.log_path(), "/tmp/zellij-web.log");

        service.binary = "zj".to_string();
        assert_eq!(service.log_path(), "/tmp/zj-web.log");

        service.log_path = Some(PathBuf::from("/var/log/web.log"));
        assert_eq!(service.log_path(), "/var/log/web.log");
    }

    #[test]
    fn test_token_parser_from_toml() {
        let config: ClientConfig =
            toml::from_str("[service]\ntoken_parser = \"legacy\"\n").unwrap();
        assert_eq!(config.service.token_parser, TokenParser::Legacy);
        assert_eq!(config.service.poll_attempts, 5);
    }
}
