//! Session orchestrator: owns the session collection and runs per-session flows
//!
//! Each session moves through `Disconnected -> Connecting -> Connected ->
//! Disconnected`. A failed connect publishes `Error` and leaves the session
//! disconnected, so it can simply be retried.
//!
//! # Flows
//!
//! - *Direct* sessions probe `https://<host>:<probe port>/<remote session>`
//!   and are connected when the endpoint answers.
//! - *Bootstrap* sessions open a remote shell, start the multiplexing
//!   service, resolve a reachable address, mint a token and compose the
//!   final URL. The shell is kept in the handle arena until the session is
//!   disconnected or killed.
//!
//! At most one flow runs per session. Starting a connect, disconnect or kill
//! cancels the flow it supersedes; a cancelled flow closes whatever it opened
//! and commits neither state nor status.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use zl_core::config::{ClientConfig, ConnectMode, ConnectionConfig};
use zl_core::error::SessionError;
use zl_core::slug::{slugify, synthesize};
use zl_core::time::current_time_millis;
use zl_core::traits::{Probe, RemoteShell, SessionStore, ShellConnector};
use zl_core::{ConnectionStatus, Session, SessionId, TestOutcome};
use zl_remote::ssh::rewrite_loopback;
use zl_remote::ServiceManager;

use crate::coordinator::{SessionBook, StateCoordinator};
use crate::handles::{Flow, FlowRegistry, HandleArena, LiveHandle};
use crate::urls::{direct_url, session_url};

/// Command used by bootstrap-mode connection tests
const TEST_COMMAND: &str = "echo ok";

/// Outcome of a successful connect flow, before it is committed
struct Established {
    url: String,
    token: Option<String>,
}

struct Inner {
    config: ClientConfig,
    state: StateCoordinator,
    connector: Arc<dyn ShellConnector>,
    probe: Arc<dyn Probe>,
    handles: HandleArena,
    flows: FlowRegistry,
}

/// Owner of the session collection.
///
/// Cheap to clone; clones share the same state, which is what lets
/// [`spawn_connect`](Self::spawn_connect) run flows as independent tasks.
#[derive(Clone)]
pub struct SessionOrchestrator {
    inner: Arc<Inner>,
}

impl SessionOrchestrator {
    /// Create an orchestrator, loading the persisted sessions from `store`
    pub fn new(
        config: ClientConfig,
        store: Arc<dyn SessionStore>,
        connector: Arc<dyn ShellConnector>,
        probe: Arc<dyn Probe>,
    ) -> Result<Self, SessionError> {
        let state = StateCoordinator::load(store)?;
        Ok(Self {
            inner: Arc::new(Inner {
                config,
                state,
                connector,
                probe,
                handles: HandleArena::new(),
                flows: FlowRegistry::new(),
            }),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Watch the current status. Only the latest value is retained.
    pub fn subscribe_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.inner.state.subscribe()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.inner.state.status()
    }

    pub async fn sessions(&self) -> Vec<Session> {
        self.inner.state.read(|book| book.sessions.clone()).await
    }

    pub async fn snapshot(&self) -> SessionBook {
        self.inner.state.snapshot().await
    }

    pub async fn session(&self, id: &SessionId) -> Option<Session> {
        self.inner.state.read(|book| book.get(id).cloned()).await
    }

    /// First session matching an id, id prefix, title or remote session name
    pub async fn find(&self, query: &str) -> Option<Session> {
        self.inner
            .state
            .read(|book| book.sessions.iter().find(|s| s.matches(query)).cloned())
            .await
    }

    pub async fn active(&self) -> Option<Session> {
        self.inner
            .state
            .read(|book| book.active_session().cloned())
            .await
    }

    /// Make `id` the active selection
    pub async fn select(&self, id: &SessionId) -> Result<(), SessionError> {
        self.inner
            .state
            .commit(|book| {
                let index = book
                    .position(id)
                    .ok_or_else(|| SessionError::NotFound(id.to_string()))?;
                book.active = Some(index);
                Ok(())
            })
            .await
    }

    /// Whether a remote shell is currently held for `id`
    pub fn has_live_handle(&self, id: &SessionId) -> bool {
        self.inner.handles.contains(id)
    }

    fn resolve_host(&self, host: &str) -> String {
        rewrite_loopback(host, self.inner.config.ssh.loopback_alias.as_deref())
    }

    /// Dry-run a config without touching the session collection
    pub async fn test_connection(&self, config: &ConnectionConfig) -> TestOutcome {
        if let Err(e) = config.validate_strict() {
            return TestOutcome::Error(e.to_string());
        }

        match config.mode {
            ConnectMode::Direct => {
                let name = config
                    .remote_session
                    .as_deref()
                    .map(str::trim)
                    .filter(|n| !n.is_empty())
                    .map(slugify)
                    .unwrap_or_default();
                let url = direct_url(
                    &self.resolve_host(&config.host),
                    self.inner.config.probe.port,
                    &name,
                );

                if self
                    .inner
                    .probe
                    .probe(&url, self.inner.config.probe.timeout)
                    .await
                {
                    TestOutcome::Success("Connection successful!".to_string())
                } else {
                    TestOutcome::Error(SessionError::Unreachable(url).to_string())
                }
            }
            ConnectMode::Bootstrap => {
                let shell = match self.inner.connector.open(config).await {
                    Ok(shell) => shell,
                    Err(e) => return TestOutcome::Error(e.to_string()),
                };
                let result = shell
                    .execute(TEST_COMMAND, self.inner.config.ssh.probe_command_timeout)
                    .await;
                shell.disconnect().await;

                match result {
                    Ok(r) if r.success => {
                        TestOutcome::Success("Connection successful!".to_string())
                    }
                    Ok(r) => TestOutcome::Error(format!(
                        "Test command failed with exit code {}: {}",
                        r.exit_code,
                        r.output().trim()
                    )),
                    Err(e) => TestOutcome::Error(e.to_string()),
                }
            }
        }
    }

    /// Add a session for `config` and select it
    pub async fn add_session(&self, config: ConnectionConfig) -> Result<Session, SessionError> {
        config.validate_strict()?;

        let requested = config
            .remote_session
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(slugify);

        let session = self
            .inner
            .state
            .commit(|book| {
                if let Some(name) = &requested {
                    let duplicate = book
                        .sessions
                        .iter()
                        .any(|s| s.config.host == config.host && &s.remote_session == name);
                    if duplicate {
                        return Err(SessionError::DuplicateSession {
                            host: config.host.clone(),
                            name: name.clone(),
                        });
                    }
                }

                let session = Session {
                    id: SessionId::generate(),
                    title: config.display_name().to_string(),
                    remote_session: requested.clone().unwrap_or_else(synthesize),
                    config: config.clone(),
                    connected: false,
                    url: None,
                    last_token: None,
                    last_connected: None,
                };
                book.sessions.push(session.clone());
                book.active = Some(book.sessions.len() - 1);
                Ok(session)
            })
            .await?;

        tracing::info!(
            "Added session {} ({}) on {}",
            session.id.short(),
            session.remote_session,
            session.config.host
        );
        Ok(session)
    }

    /// Replace the credentials of a stored session.
    ///
    /// Used when secrets were not persisted and must be supplied again.
    pub async fn update_credentials(
        &self,
        id: &SessionId,
        secret: Option<String>,
        key_passphrase: Option<String>,
    ) -> Result<Session, SessionError> {
        self.inner
            .state
            .update_session(id, |s| {
                if secret.is_some() {
                    s.config.secret = secret;
                }
                if key_passphrase.is_some() {
                    s.config.key_passphrase = key_passphrase;
                }
            })
            .await
    }

    /// Run the connect flow for `id` to completion
    pub async fn connect_session(&self, id: &SessionId) -> Result<Session, SessionError> {
        let session = self
            .session(id)
            .await
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;

        let flow = self.inner.flows.begin(id);
        tracing::info!(
            "Connecting session {} to {} ({:?} mode)",
            id.short(),
            session.config.host,
            session.config.mode
        );
        self.inner
            .state
            .publish(ConnectionStatus::Connecting(session.title.clone()));

        let outcome = tokio::select! {
            biased;
            _ = flow.token.cancelled() => Err(SessionError::Cancelled),
            result = self.run_connect(&session, &flow) => result,
        };

        let result = match outcome {
            Ok(established) => self.commit_connected(id, &flow, established).await,
            Err(e) => Err(e),
        };

        match &result {
            Ok(connected) => {
                tracing::info!("Session {} connected at {:?}", id.short(), connected.url);
                self.inner.state.publish(ConnectionStatus::Connected(format!(
                    "Connected to {}",
                    connected.title
                )));
            }
            Err(SessionError::Cancelled) => {
                tracing::debug!("Connect flow for {} was superseded", id.short());
                self.teardown(id, &flow).await;
            }
            Err(e) => {
                tracing::warn!("Connect flow for {} failed: {}", id.short(), e);
                self.teardown(id, &flow).await;
                if session.connected {
                    if !flow.is_cancelled() {
                        if let Some(stale) = self.inner.handles.take(id) {
                            tracing::debug!("Closing previous shell for {}", id.short());
                            stale.shell.disconnect().await;
                        }
                    }
                    self.clear_connected(id).await;
                }
                self.inner
                    .state
                    .publish(ConnectionStatus::Error(e.to_string()));
            }
        }

        self.inner.flows.finish(id, &flow);
        result
    }

    /// Run the connect flow for `id` as an independent task
    pub fn spawn_connect(&self, id: SessionId) -> JoinHandle<Result<Session, SessionError>> {
        let orchestrator = self.clone();
        tokio::spawn(async move { orchestrator.connect_session(&id).await })
    }

    async fn run_connect(&self, session: &Session, flow: &Flow) -> Result<Established, SessionError> {
        match session.config.mode {
            ConnectMode::Direct => self.connect_direct(session).await,
            ConnectMode::Bootstrap => self.connect_bootstrap(session, flow).await,
        }
    }

    async fn connect_direct(&self, session: &Session) -> Result<Established, SessionError> {
        let url = direct_url(
            &self.resolve_host(&session.config.host),
            self.inner.config.probe.port,
            &session.remote_session,
        );

        if self
            .inner
            .probe
            .probe(&url, self.inner.config.probe.timeout)
            .await
        {
            Ok(Established { url, token: None })
        } else {
            Err(SessionError::Unreachable(url))
        }
    }

    async fn connect_bootstrap(
        &self,
        session: &Session,
        flow: &Flow,
    ) -> Result<Established, SessionError> {
        let shell = self.inner.connector.open(&session.config).await?;

        let live = LiveHandle {
            shell: Arc::clone(&shell),
            generation: flow.generation,
        };
        if let Some(previous) = self.inner.handles.insert(session.id.clone(), live) {
            tracing::debug!("Replacing remote shell for {}", session.id.short());
            previous.shell.disconnect().await;
        }

        let service = ServiceManager::new(shell, &self.inner.config);
        let port = service.start().await?;

        let host = match service.overlay_address().await {
            Some(address) => {
                tracing::debug!("Using overlay address {} for {}", address, session.config.host);
                address.to_string()
            }
            None => self.resolve_host(&session.config.host),
        };

        let token = service.create_auth_token().await?;

        Ok(Established {
            url: session_url(&host, port, &session.remote_session, &token),
            token: Some(token),
        })
    }

    async fn commit_connected(
        &self,
        id: &SessionId,
        flow: &Flow,
        established: Established,
    ) -> Result<Session, SessionError> {
        self.inner
            .state
            .commit(|book| {
                if flow.is_cancelled() {
                    return Err(SessionError::Cancelled);
                }
                let session = book
                    .get_mut(id)
                    .ok_or_else(|| SessionError::NotFound(id.to_string()))?;
                session.connected = true;
                session.url = Some(established.url);
                if let Some(token) = established.token {
                    session.last_token = Some(token);
                }
                session.last_connected = Some(current_time_millis());
                Ok(session.clone())
            })
            .await
    }

    /// Close the shell opened by `flow`, if it is still the registered one
    async fn teardown(&self, id: &SessionId, flow: &Flow) {
        if let Some(live) = self.inner.handles.take_if_owned(id, flow.generation) {
            live.shell.disconnect().await;
        }
    }

    async fn clear_connected(&self, id: &SessionId) {
        let result = self
            .inner
            .state
            .update_session(id, |s| {
                s.connected = false;
                s.url = None;
            })
            .await;
        if let Err(e) = result {
            tracing::warn!("Failed to mark {} disconnected: {}", id.short(), e);
        }
    }

    /// Close the remote shell (if any) and mark the session disconnected.
    ///
    /// The remote service keeps running.
    pub async fn disconnect_session(&self, id: &SessionId) -> Result<Session, SessionError> {
        let flow = self.inner.flows.begin(id);
        let result = self.soft_disconnect(id).await;
        self.inner.flows.finish(id, &flow);
        result
    }

    async fn soft_disconnect(&self, id: &SessionId) -> Result<Session, SessionError> {
        if let Some(live) = self.inner.handles.take(id) {
            live.shell.disconnect().await;
        }

        let session = self
            .inner
            .state
            .update_session(id, |s| {
                s.connected = false;
                s.url = None;
            })
            .await?;

        tracing::info!("Disconnected session {}", id.short());
        self.inner.state.publish(ConnectionStatus::Disconnected);
        Ok(session)
    }

    /// Stop the remote service, then disconnect.
    ///
    /// Failing to stop the service is logged and does not prevent the
    /// disconnect. Direct-mode sessions have no service to stop.
    pub async fn kill_session(&self, id: &SessionId) -> Result<Session, SessionError> {
        let session = self
            .session(id)
            .await
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;

        let flow = self.inner.flows.begin(id);

        match session.config.mode {
            ConnectMode::Bootstrap => self.stop_service(&session).await,
            ConnectMode::Direct => {
                tracing::debug!("Session {} is direct, nothing to stop", id.short())
            }
        }

        let result = self.soft_disconnect(id).await;
        self.inner.flows.finish(id, &flow);
        result
    }

    async fn stop_service(&self, session: &Session) {
        let (shell, opened_here): (Arc<dyn RemoteShell>, bool) =
            match self.inner.handles.get(&session.id) {
                Some(shell) => (shell, false),
                None => match self.inner.connector.open(&session.config).await {
                    Ok(shell) => (shell, true),
                    Err(e) => {
                        tracing::warn!(
                            "Could not reach {} to stop the service: {}",
                            session.config.host,
                            e
                        );
                        return;
                    }
                },
            };

        let service = ServiceManager::new(Arc::clone(&shell), &self.inner.config);
        if service.stop().await {
            tracing::info!("Stopped service on {}", session.config.host);
        } else {
            tracing::warn!("Service on {} may still be running", session.config.host);
        }

        if opened_here {
            shell.disconnect().await;
        }
    }

    /// Disconnect and delete a session
    pub async fn remove_session(&self, id: &SessionId) -> Result<Session, SessionError> {
        self.disconnect_session(id).await?;

        let removed = self
            .inner
            .state
            .commit(|book| {
                book.remove(id)
                    .ok_or_else(|| SessionError::NotFound(id.to_string()))
            })
            .await?;

        tracing::info!("Removed session {}", id.short());
        Ok(removed)
    }

    /// Cancel every flow and close every held shell.
    ///
    /// Session records are left as they are.
    pub async fn shutdown(&self) {
        self.inner.flows.cancel_all();
        for (id, live) in self.inner.handles.drain() {
            tracing::debug!("Closing remote shell for {}", id.short());
            live.shell.disconnect().await;
        }
    }
}
