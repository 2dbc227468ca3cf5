//! zl-orchestrator: Session ownership and connect flows for Zelland
//!
//! The [`SessionOrchestrator`] owns the canonical session collection and
//! runs the per-session connect, disconnect, kill and test flows against
//! the remote collaborators from `zl-remote`. All collection mutations go
//! through the [`StateCoordinator`], which persists every change through a
//! [`SessionStore`](zl_core::traits::SessionStore).

pub mod coordinator;
pub mod handles;
pub mod orchestrator;
pub mod store;
pub mod urls;

pub use coordinator::{SessionBook, StateCoordinator};
pub use orchestrator::SessionOrchestrator;
pub use store::{JsonFileStore, MemoryStore};
