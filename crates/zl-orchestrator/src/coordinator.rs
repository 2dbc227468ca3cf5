//! State coordinator for the session collection
//!
//! The `StateCoordinator` owns the canonical [`SessionBook`] (ordered
//! sessions plus the active selection) and the current
//! [`ConnectionStatus`]. Every mutation goes through [`StateCoordinator::commit`],
//! which holds the write lock for the whole read-modify-persist cycle.
//!
//! # Atomicity Model
//!
//! A commit works on a copy of the book. The copy replaces the canonical
//! book only after the store accepted it, so a failed save or a rejected
//! mutation leaves memory and disk exactly as they were. Readers take the
//! read lock and never observe a half-applied change.
//!
//! This prevents races such as:
//! - Two connect flows finishing at once and overwriting each other's fields
//! - A remove racing a connect that is about to mark the same session connected
//! - The active index pointing past the end after a concurrent removal

use std::sync::Arc;

use tokio::sync::{watch, RwLock};

use zl_core::error::SessionError;
use zl_core::traits::SessionStore;
use zl_core::{ConnectionStatus, Session, SessionId};

/// Ordered session collection with the active selection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionBook {
    pub sessions: Vec<Session>,
    /// Index into `sessions`; `None` only when the book is empty
    pub active: Option<usize>,
}

impl SessionBook {
    /// Create a book selecting the first session, if any
    pub fn new(sessions: Vec<Session>) -> Self {
        let active = if sessions.is_empty() { None } else { Some(0) };
        Self { sessions, active }
    }

    pub fn position(&self, id: &SessionId) -> Option<usize> {
        self.sessions.iter().position(|s| &s.id == id)
    }

    pub fn get(&self, id: &SessionId) -> Option<&Session> {
        self.sessions.iter().find(|s| &s.id == id)
    }

    pub fn get_mut(&mut self, id: &SessionId) -> Option<&mut Session> {
        self.sessions.iter_mut().find(|s| &s.id == id)
    }

    pub fn active_session(&self) -> Option<&Session> {
        self.active.and_then(|i| self.sessions.get(i))
    }

    /// Remove a session, keeping the selection on the same session when
    /// possible and clamping it into range otherwise
    pub fn remove(&mut self, id: &SessionId) -> Option<Session> {
        let index = self.position(id)?;
        let removed = self.sessions.remove(index);

        self.active = match self.active {
            _ if self.sessions.is_empty() => None,
            Some(active) if index < active => Some(active - 1),
            Some(active) if active >= self.sessions.len() => Some(self.sessions.len() - 1),
            Some(active) => Some(active),
            None => Some(0),
        };

        Some(removed)
    }
}

/// Owns the session book and the published connection status.
///
/// All collection mutations are serialized through the write lock, and
/// every accepted mutation is persisted before it becomes visible.
pub struct StateCoordinator {
    book: RwLock<SessionBook>,
    store: Arc<dyn SessionStore>,
    status: watch::Sender<ConnectionStatus>,
}

impl StateCoordinator {
    /// Load the persisted sessions from `store`
    pub fn load(store: Arc<dyn SessionStore>) -> Result<Self, SessionError> {
        let sessions = store.load()?;
        tracing::debug!("Loaded {} persisted session(s)", sessions.len());
        Ok(Self::with_book(store, SessionBook::new(sessions)))
    }

    /// Create a coordinator around an existing book.
    ///
    /// The book is not written back until the first commit.
    pub fn with_book(store: Arc<dyn SessionStore>, book: SessionBook) -> Self {
        let (status, _) = watch::channel(ConnectionStatus::Disconnected);
        Self {
            book: RwLock::new(book),
            store,
            status,
        }
    }

    /// Consistent copy of the whole book
    pub async fn snapshot(&self) -> SessionBook {
        self.book.read().await.clone()
    }

    /// Run a read-only closure against the book under the read lock
    pub async fn read<R>(&self, f: impl FnOnce(&SessionBook) -> R) -> R {
        let book = self.book.read().await;
        f(&book)
    }

    /// Apply a mutation atomically.
    ///
    /// `f` runs on a copy of the book. If it returns an error, nothing
    /// changes. Otherwise the copy is persisted and then installed; a
    /// persistence failure also leaves the canonical book untouched.
    pub async fn commit<R>(
        &self,
        f: impl FnOnce(&mut SessionBook) -> Result<R, SessionError>,
    ) -> Result<R, SessionError> {
        let mut book = self.book.write().await;
        let mut next = book.clone();
        let result = f(&mut next)?;

        self.store.save(&next.sessions)?;
        *book = next;
        Ok(result)
    }

    /// Commit a change to one session, returning its new state
    pub async fn update_session(
        &self,
        id: &SessionId,
        f: impl FnOnce(&mut Session),
    ) -> Result<Session, SessionError> {
        self.commit(|book| {
            let session = book
                .get_mut(id)
                .ok_or_else(|| SessionError::NotFound(id.to_string()))?;
            f(session);
            Ok(session.clone())
        })
        .await
    }

    /// Replace the current status. Observers only see the latest value.
    pub fn publish(&self, status: ConnectionStatus) {
        tracing::debug!("Status: {}", status);
        self.status.send_replace(status);
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.subscribe()
    }
}
