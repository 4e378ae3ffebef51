//! Synchronous fallback adapter for the one-shot transport.
//!
//! Performs a single `POST {base}/orchestrate` and hands the body back
//! verbatim. When the upstream cannot be reached at all, it substitutes
//! a fixed mock payload instead of surfacing the error, so callers
//! always receive a well-formed response. The substitution is recorded
//! on the outcome: the body itself still claims success, matching the
//! upstream-compatible behavior the rest of the product expects.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::CACHE_CONTROL;
use tracing::{debug, warn};

use crate::config::RelayConfig;
use crate::domain::wire::{mock_response, OrchestrateRequest, OrchestrateResponse};

use super::Transport;

/// Result of a one-shot orchestration request.
#[derive(Debug, Clone)]
pub struct FallbackOutcome {
    /// HTTP status code (200 when the mock was substituted)
    pub status: u16,

    /// Response body, upstream's or the deterministic mock
    pub response: OrchestrateResponse,

    /// Whether the mock payload was substituted
    pub mocked: bool,
}

/// Adapter for the one-shot transport.
pub struct FallbackAdapter {
    base_url: String,
    client: reqwest::Client,
}

impl FallbackAdapter {
    /// Create an adapter for the configured upstream.
    pub fn new(config: &RelayConfig) -> Result<Self> {
        Ok(Self {
            base_url: config.base_url.clone(),
            client: super::http_client(config, true)?,
        })
    }

    /// Perform the one-shot request. Never fails: any transport error
    /// (connection refused, DNS, timeout) or unreadable body yields the
    /// mock payload with HTTP 200.
    pub async fn orchestrate(&self, request: &OrchestrateRequest) -> FallbackOutcome {
        match self.try_upstream(request).await {
            Ok(outcome) => {
                debug!(status = outcome.status, "upstream orchestrate responded");
                outcome
            }
            Err(error) => {
                warn!(%error, "upstream unreachable, substituting mock response");
                FallbackOutcome {
                    status: 200,
                    response: mock_response(),
                    mocked: true,
                }
            }
        }
    }

    async fn try_upstream(&self, request: &OrchestrateRequest) -> Result<FallbackOutcome> {
        let response = self
            .client
            .post(format!("{}/orchestrate", self.base_url))
            .header(CACHE_CONTROL, "no-cache")
            .json(request)
            .send()
            .await
            .context("Failed to reach upstream orchestrator")?;

        let status = response.status().as_u16();
        let body: OrchestrateResponse = response
            .json()
            .await
            .context("Failed to parse upstream orchestrate response")?;

        Ok(FallbackOutcome {
            status,
            response: body,
            mocked: false,
        })
    }
}

#[async_trait]
impl Transport for FallbackAdapter {
    fn name(&self) -> &str {
        "fallback"
    }

    async fn health_check(&self) -> Result<()> {
        let response = self
            .client
            .get(format!("{}/", self.base_url))
            .send()
            .await
            .context("Upstream health check failed")?;

        if !response.status().is_success() {
            anyhow::bail!("Upstream health check returned {}", response.status());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_adapter_creation() {
        let config = RelayConfig::default();
        let adapter = FallbackAdapter::new(&config).unwrap();
        assert_eq!(adapter.name(), "fallback");
    }

    // The mock-substitution path is covered end-to-end by
    // tests/fallback.rs against an unreachable port.
}
