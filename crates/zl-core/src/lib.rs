//! zl-core: Core abstractions and configuration for Zelland
//!
//! This crate provides the data model (connection configs, sessions,
//! statuses), the error taxonomy, configuration loading, and the traits
//! that decouple the session orchestrator from its remote collaborators.

pub mod config;
pub mod error;
pub mod overlay;
pub mod slug;
pub mod time;
pub mod traits;
pub mod types;

pub use error::ZlError;
pub use types::{CommandResult, ConnectionStatus, Session, SessionId, TestOutcome};
