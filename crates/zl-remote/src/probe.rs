//! HTTPS reachability probe for direct-mode connects
//!
//! The probe accepts any certificate for any host name. Direct mode targets
//! services on a private network that serve self-signed certificates, and the
//! probe only answers "is something listening here". It never sends
//! credentials and its response body is discarded. Do not reuse this client
//! for anything that carries secrets.

use std::time::Duration;

use async_trait::async_trait;

use zl_core::traits::Probe;

/// Whether an HTTP status means the endpoint exists and is answering.
///
/// Auth challenges (401, 403) count: the service is there, it just wants a token.
pub fn classify_status(status: u16) -> bool {
    (200..400).contains(&status) || status == 401 || status == 403
}

/// [`Probe`] issuing a single `HEAD` request
#[derive(Debug, Default, Clone)]
pub struct HttpProbe;

impl HttpProbe {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Probe for HttpProbe {
    async fn probe(&self, url: &str, timeout: Duration) -> bool {
        let client = match reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .redirect(reqwest::redirect::Policy::none())
            .timeout(timeout)
            .build()
        {
            Ok(client) => client,
            Err(e) => {
                tracing::warn!("Failed to build probe client: {}", e);
                return false;
            }
        };

        match client.head(url).send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                let reachable = classify_status(status);
                tracing::debug!("Probe {} -> {} (reachable: {})", url, status, reachable);
                reachable
            }
            Err(e) => {
                tracing::debug!("Probe {} failed: {}", url, e);
                false
            }
        }
    }
}
