//! Live remote-command handles and in-flight flows, keyed by session
//!
//! Both maps are owned by the orchestrator and live outside the session
//! records, so a session can be copied, persisted or removed without
//! touching the connection behind it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;

use zl_core::traits::RemoteShell;
use zl_core::SessionId;

/// A remote shell opened by one flow
#[derive(Clone)]
pub struct LiveHandle {
    pub shell: Arc<dyn RemoteShell>,
    /// Generation of the flow that opened it
    pub generation: u64,
}

/// Arena of open remote shells, at most one per session
pub struct HandleArena {
    handles: DashMap<SessionId, LiveHandle>,
}

impl HandleArena {
    pub fn new() -> Self {
        Self {
            handles: DashMap::new(),
        }
    }

    /// Store a handle, returning the one it replaced
    pub fn insert(&self, id: SessionId, handle: LiveHandle) -> Option<LiveHandle> {
        self.handles.insert(id, handle)
    }

    pub fn get(&self, id: &SessionId) -> Option<Arc<dyn RemoteShell>> {
        self.handles.get(id).map(|h| Arc::clone(&h.shell))
    }

    pub fn take(&self, id: &SessionId) -> Option<LiveHandle> {
        self.handles.remove(id).map(|(_, h)| h)
    }

    /// Remove the handle only if it was opened by flow `generation`
    pub fn take_if_owned(&self, id: &SessionId, generation: u64) -> Option<LiveHandle> {
        self.handles
            .remove_if(id, |_, h| h.generation == generation)
            .map(|(_, h)| h)
    }

    /// Remove every handle, e.g. on shutdown
    pub fn drain(&self) -> Vec<(SessionId, LiveHandle)> {
        let ids: Vec<SessionId> = self.handles.iter().map(|r| r.key().clone()).collect();
        ids.into_iter()
            .filter_map(|id| self.handles.remove(&id))
            .collect()
    }

    pub fn contains(&self, id: &SessionId) -> bool {
        self.handles.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

impl Default for HandleArena {
    fn default() -> Self {
        Self::new()
    }
}

/// Cancellation ticket for one flow
#[derive(Debug, Clone)]
pub struct Flow {
    pub generation: u64,
    pub token: CancellationToken,
}

impl Flow {
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Tracks the newest flow per session.
///
/// Beginning a flow cancels the one it supersedes; finishing only clears
/// the entry if no newer flow has started since.
pub struct FlowRegistry {
    flows: DashMap<SessionId, Flow>,
    next_generation: AtomicU64,
}

impl FlowRegistry {
    pub fn new() -> Self {
        Self {
            flows: DashMap::new(),
            next_generation: AtomicU64::new(1),
        }
    }

    pub fn begin(&self, id: &SessionId) -> Flow {
        let flow = Flow {
            generation: self.next_generation.fetch_add(1, Ordering::Relaxed),
            token: CancellationToken::new(),
        };
        if let Some(previous) = self.flows.insert(id.clone(), flow.clone()) {
            tracing::debug!(
                "Flow {} for session {} superseded by {}",
                previous.generation,
                id.short(),
                flow.generation
            );
            previous.token.cancel();
        }
        flow
    }

    pub fn finish(&self, id: &SessionId, flow: &Flow) {
        self.flows
            .remove_if(id, |_, current| current.generation == flow.generation);
    }

    /// Cancel every in-flight flow
    pub fn cancel_all(&self) {
        for entry in self.flows.iter() {
            entry.value().token.cancel();
        }
        self.flows.clear();
    }

    pub fn is_running(&self, id: &SessionId) -> bool {
        self.flows.contains_key(id)
    }
}

impl Default for FlowRegistry {
    fn default() -> Self {
        Self::new()
    }
}
