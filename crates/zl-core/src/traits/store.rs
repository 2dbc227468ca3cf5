//! Session persistence trait

use crate::error::StoreError;
use crate::types::Session;

/// External collaborator persisting the session collection.
///
/// `save` always receives the complete collection.
pub trait SessionStore: Send + Sync {
    /// Load all persisted sessions
    fn load(&self) -> Result<Vec<Session>, StoreError>;

    /// Replace the persisted collection
    fn save(&self, sessions: &[Session]) -> Result<(), StoreError>;
}
