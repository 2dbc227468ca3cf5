//! zl-remote: Remote collaborators for Zelland
//!
//! Everything in this crate talks to a remote host:
//! - [`ssh`]: the remote command channel (one SSH connection, one command per exec channel)
//! - [`service`]: the multiplexing service state machine driven through that channel
//! - [`probe`]: the HTTPS reachability probe used by direct-mode connects
//! - [`control`]: the long-lived WebSocket control channel to the companion daemon

pub mod control;
pub mod probe;
pub mod service;
pub mod ssh;

pub use control::{ControlChannel, ControlEndpoint, ControlError, ControlEvent};
pub use probe::HttpProbe;
pub use service::ServiceManager;
pub use ssh::{SshCommandChannel, SshConnector};
