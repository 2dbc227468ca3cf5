//! russh client handler

use async_trait::async_trait;
use russh::client;
use russh_keys::key::PublicKey;

/// Client handler for command channels.
///
/// Host keys are accepted without verification; the fingerprint is logged
/// so it can be compared by hand.
pub(crate) struct ClientHandler {
    host: String,
}

impl ClientHandler {
    pub(crate) fn new(host: impl Into<String>) -> Self {
        Self { host: host.into() }
    }
}

#[async_trait]
impl client::Handler for ClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        tracing::debug!(
            "Host key for {}: {}",
            self.host,
            server_public_key.fingerprint()
        );
        Ok(true)
    }
}
