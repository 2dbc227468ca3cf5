//! Lifecycle of the remote multiplexing service, driven over a command channel

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use zl_core::config::{ClientConfig, ServiceConfig};
use zl_core::error::ServiceError;
use zl_core::overlay::{parse_overlay_address, OVERLAY_ADDRESS_COMMAND};
use zl_core::traits::CommandExecutor;
use zl_core::CommandResult;

use super::token::{extract_token, strip_ansi};
use super::version::{is_version_supported, parse_version};

/// Starts, stops and queries the service on one remote host.
///
/// Generic over the executor so it can run on a concrete channel, on
/// `dyn RemoteShell`, or on a scripted fake in tests.
pub struct ServiceManager<E: CommandExecutor + ?Sized> {
    executor: Arc<E>,
    config: ServiceConfig,
    check_timeout: Duration,
    command_timeout: Duration,
}

impl<E: CommandExecutor + ?Sized> ServiceManager<E> {
    /// Create a manager using the service and timeout settings from `config`
    pub fn new(executor: Arc<E>, config: &ClientConfig) -> Self {
        Self {
            executor,
            config: config.service.clone(),
            check_timeout: config.ssh.probe_command_timeout,
            command_timeout: config.ssh.command_timeout,
        }
    }

    fn binary(&self) -> &str {
        &self.config.binary
    }

    fn process_tag(&self) -> String {
        format!("{} web", self.binary())
    }

    async fn run(&self, command: &str, timeout: Duration) -> Result<CommandResult, ServiceError> {
        Ok(self.executor.execute(command, timeout).await?)
    }

    /// Whether the service binary is on the remote `PATH`
    pub async fn is_installed(&self) -> bool {
        self.executor.exists(self.binary(), self.check_timeout).await
    }

    /// Installed version, or `None` if it cannot be determined
    pub async fn version(&self) -> Option<String> {
        let command = format!("{} --version", self.binary());
        match self.run(&command, self.check_timeout).await {
            Ok(result) if result.success => parse_version(&result.stdout),
            Ok(_) => None,
            Err(e) => {
                tracing::debug!("Version query failed: {}", e);
                None
            }
        }
    }

    async fn pid_line(&self) -> Option<String> {
        let command = format!("pgrep -f '{}' | head -1", self.process_tag());
        match self.run(&command, self.check_timeout).await {
            Ok(result) if result.success => {
                let line = result.stdout.trim();
                (!line.is_empty()).then(|| line.to_string())
            }
            Ok(_) => None,
            Err(e) => {
                tracing::debug!("Process check failed: {}", e);
                None
            }
        }
    }

    /// Whether the web service process is running
    pub async fn is_running(&self) -> bool {
        self.pid_line().await.is_some()
    }

    /// PID of the running web service
    pub async fn pid(&self) -> Option<u32> {
        self.pid_line().await.and_then(|line| line.parse().ok())
    }

    /// Ensure the web service is running and return its port.
    ///
    /// Idempotent: an already running service is left alone.
    pub async fn start(&self) -> Result<u16, ServiceError> {
        if !self.is_installed().await {
            return Err(ServiceError::NotInstalled(format!(
                "{} is not installed on the remote host. Install with: curl -L zellij.dev/install.sh | bash",
                self.binary()
            )));
        }

        if let Some(version) = self.version().await {
            if !is_version_supported(&version) {
                tracing::warn!(
                    "{} version {} may not support the web client",
                    self.binary(),
                    version
                );
            }
        }

        if self.is_running().await {
            tracing::info!("{} already running", self.process_tag());
            return Ok(self.config.default_port);
        }

        let log_path = self.config.log_path();
        let command = format!("nohup {} > {} 2>&1 &", self.process_tag(), log_path);
        let result = self.run(&command, self.command_timeout).await?;
        if !result.success {
            return Err(ServiceError::StartupFailed(format!(
                "Failed to start {}: {}",
                self.process_tag(),
                result.stderr.trim()
            )));
        }
        tracing::debug!("Launched {}, waiting {:?}", self.process_tag(), self.config.settle_delay);

        tokio::time::sleep(self.config.settle_delay).await;

        for attempt in 1..=self.config.poll_attempts {
            if self.is_running().await {
                tracing::info!("{} started after {} poll(s)", self.process_tag(), attempt);
                return Ok(self.config.default_port);
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }

        let tail = format!("tail -{} {}", self.config.log_tail_lines, log_path);
        let logs = match self.run(&tail, self.check_timeout).await {
            Ok(result) => result.stdout,
            Err(e) => format!("(could not read {}: {})", log_path, e),
        };
        tracing::error!("{} failed to start. Logs:\n{}", self.process_tag(), logs);

        Err(ServiceError::StartupFailed(format!(
            "{} failed to start. Logs:\n{}",
            self.process_tag(),
            logs
        )))
    }

    /// Stop the web service. Returns whether it is confirmed gone.
    pub async fn stop(&self) -> bool {
        let command = format!("pkill -f '{}'", self.process_tag());
        if let Err(e) = self.run(&command, self.check_timeout).await {
            tracing::warn!("Failed to stop {}: {}", self.process_tag(), e);
            return false;
        }

        tokio::time::sleep(self.config.stop_grace).await;

        let still_running = self.is_running().await;
        if still_running {
            tracing::warn!("{} may still be running after pkill", self.process_tag());
        }
        !still_running
    }

    /// Mint a new auth token for the web client
    pub async fn create_auth_token(&self) -> Result<String, ServiceError> {
        let command = format!("{} --create-token", self.process_tag());
        let result = self
            .run(&command, self.command_timeout)
            .await
            .map_err(|e| ServiceError::StartupFailed(format!("Error creating auth token: {}", e)))?;

        if !result.success {
            return Err(ServiceError::StartupFailed(format!(
                "Failed to create auth token: {}",
                result.stderr.trim()
            )));
        }

        let token = extract_token(&result.stdout, self.config.token_parser)?;
        tracing::debug!("Extracted auth token");
        Ok(token)
    }

    /// Names of the multiplexer sessions on the host, one per output line
    pub async fn session_list(&self) -> Result<Vec<String>, ServiceError> {
        let command = format!("{} list-sessions 2>/dev/null || echo ''", self.binary());
        let result = self.run(&command, self.command_timeout).await?;
        if !result.success {
            return Ok(Vec::new());
        }

        Ok(strip_ansi(&result.stdout)
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    /// Whether a session named `name` exists.
    ///
    /// Lines may carry decorations after the name (`work [Created 2h ago]`).
    pub async fn session_exists(&self, name: &str) -> Result<bool, ServiceError> {
        Ok(self
            .session_list()
            .await?
            .iter()
            .any(|line| line.split_whitespace().next() == Some(name)))
    }

    /// Delete a multiplexer session. Returns whether the command succeeded.
    pub async fn kill_session(&self, name: &str) -> Result<bool, ServiceError> {
        let command = format!("{} delete-session {}", self.binary(), name);
        Ok(self.run(&command, self.command_timeout).await?.success)
    }

    /// Last `lines` lines of the service log
    pub async fn logs(&self, lines: usize) -> String {
        let command = format!(
            "tail -{} {} 2>/dev/null || echo 'No logs available'",
            lines,
            self.config.log_path()
        );
        match self.run(&command, self.check_timeout).await {
            Ok(result) => result.stdout,
            Err(e) => format!("Error retrieving logs: {}", e),
        }
    }

    /// Overlay network address of the host, if the overlay tool answers
    pub async fn overlay_address(&self) -> Option<Ipv4Addr> {
        match self.run(OVERLAY_ADDRESS_COMMAND, self.check_timeout).await {
            Ok(result) if result.success => {
                let address = parse_overlay_address(&result.stdout);
                tracing::debug!("Overlay address: {:?}", address);
                address
            }
            Ok(result) => {
                tracing::debug!("No overlay address: {}", result.stderr.trim());
                None
            }
            Err(e) => {
                tracing::debug!("Overlay address query failed: {}", e);
                None
            }
        }
    }
}
