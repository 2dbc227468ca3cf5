//! SSH remote command channel

mod channel;
mod connector;
mod handler;

pub use channel::{rewrite_loopback, SshCommandChannel};
pub use connector::SshConnector;
