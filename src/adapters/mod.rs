//! Adapter interfaces for the upstream orchestrator.
//!
//! Adapters are the only components that speak HTTP. The relay forwards
//! the streaming transport, the fallback adapter wraps the one-shot
//! transport, and both share the upstream health probe.

pub mod fallback;
pub mod relay;
pub mod sse;

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::config::RelayConfig;

// Re-export the concrete adapters
pub use fallback::{FallbackAdapter, FallbackOutcome};
pub use relay::StreamRelay;
pub use sse::{SseDecoder, SseError, SseFrame};

/// Trait for upstream transports.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Human-readable transport name
    fn name(&self) -> &str;

    /// Probe the upstream orchestrator (`GET {base}/`)
    async fn health_check(&self) -> Result<()>;
}

/// Build the shared HTTP client. The one-shot transport bounds the whole
/// request; the streaming transport bounds individual reads instead.
pub(crate) fn http_client(config: &RelayConfig, bound_total: bool) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder().connect_timeout(config.connect_timeout);
    if bound_total {
        builder = builder.timeout(config.request_timeout);
    }
    builder.build().context("Failed to build HTTP client")
}
