//! Reachability probe trait

use async_trait::async_trait;
use std::time::Duration;

/// Answers whether an HTTP(S) endpoint exists and is answering.
///
/// Implementations never fail; every error maps to `false`.
#[async_trait]
pub trait Probe: Send + Sync {
    async fn probe(&self, url: &str, timeout: Duration) -> bool;
}
