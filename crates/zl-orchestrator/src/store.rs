//! Session persistence

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use zl_core::error::StoreError;
use zl_core::traits::SessionStore;
use zl_core::Session;

/// Stores sessions as a pretty-printed JSON array.
///
/// Credentials and service tokens are stripped before writing unless the
/// session's config opted in with `persist_secret`. Writes go to a sibling temp file that
/// is renamed over the target.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionStore for JsonFileStore {
    fn load(&self) -> Result<Vec<Session>, StoreError> {
        if !self.path.exists() {
            tracing::debug!("No session file at {:?}", self.path);
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&content)?)
    }

    fn save(&self, sessions: &[Session]) -> Result<(), StoreError> {
        let stored: Vec<Session> = sessions.iter().map(Session::for_storage).collect();

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(&stored)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, &self.path)?;

        tracing::trace!("Saved {} session(s) to {:?}", stored.len(), self.path);
        Ok(())
    }
}

/// In-memory store, for embedding and tests
#[derive(Default)]
pub struct MemoryStore {
    sessions: Mutex<Vec<Session>>,
    saves: AtomicUsize,
    fail: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sessions(sessions: Vec<Session>) -> Self {
        Self {
            sessions: Mutex::new(sessions),
            ..Self::default()
        }
    }

    /// Last saved collection
    pub fn sessions(&self) -> Vec<Session> {
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Number of successful saves
    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Make subsequent saves fail with an I/O error
    pub fn fail_saves(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

impl SessionStore for MemoryStore {
    fn load(&self) -> Result<Vec<Session>, StoreError> {
        Ok(self.sessions())
    }

    fn save(&self, sessions: &[Session]) -> Result<(), StoreError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "store unavailable",
            )));
        }
        *self
            .sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = sessions.to_vec();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
