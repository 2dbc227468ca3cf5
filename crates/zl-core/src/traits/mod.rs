//! Core trait definitions

mod executor;
mod probe;
mod store;

pub use executor::{CommandExecutor, RemoteShell, ShellConnector};
pub use probe::Probe;
pub use store::SessionStore;
