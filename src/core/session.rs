//! The boundary the rendering surface drives runs through.
//!
//! Owns the session context, the coordinator and both transports, and
//! enforces the single-active-run guard: while a run is current and not
//! yet terminal, new run requests are rejected here, before they reach
//! the coordinator.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use thiserror::Error;
use tracing::info;

use crate::adapters::{FallbackAdapter, StreamRelay};
use crate::config::RelayConfig;
use crate::core::coordinator::{Coordinator, SessionContext};
use crate::core::observer::RunObserver;
use crate::domain::run::{HistoryEntry, RunContext};
use crate::domain::stage::Stage;
use crate::domain::wire::{OrchestrateRequest, OrchestrateResponse};

/// Which transport a run uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportMode {
    /// Live event stream from `/orchestrate/stream`
    Streaming,

    /// One-shot `/orchestrate` request with mock substitution on failure
    Sync,
}

/// Rejected run request.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("a run is already in progress")]
    RunInProgress,
}

/// Session-scoped pipeline facade.
pub struct PipelineSession {
    coordinator: Coordinator,
    ctx: SessionContext,
    relay: StreamRelay,
    fallback: FallbackAdapter,
}

impl PipelineSession {
    /// Build a session against the configured upstream.
    pub fn new(config: RelayConfig) -> Result<Self> {
        Ok(Self {
            coordinator: Coordinator::new(config.pacing),
            ctx: SessionContext::new(),
            relay: StreamRelay::new(&config)?,
            fallback: FallbackAdapter::new(&config)?,
        })
    }

    /// Register a read-only observer for stage, history and celebration
    /// notifications.
    pub fn subscribe(&mut self, observer: Arc<dyn RunObserver>) {
        self.coordinator.subscribe(observer);
    }

    /// Start a run for a bare prompt and drive it to a terminal state.
    pub async fn start_run(
        &mut self,
        prompt: &str,
        mode: TransportMode,
    ) -> Result<u64, SessionError> {
        self.start_run_request(OrchestrateRequest::new(prompt), mode)
            .await
    }

    /// Start a run for a full request (prompt plus optional user token)
    /// and drive it to a terminal state.
    pub async fn start_run_request(
        &mut self,
        request: OrchestrateRequest,
        mode: TransportMode,
    ) -> Result<u64, SessionError> {
        if self
            .ctx
            .current()
            .is_some_and(|run| !run.is_terminal())
        {
            return Err(SessionError::RunInProgress);
        }

        let run_id = self.coordinator.begin_run(&mut self.ctx, &request.prompt);
        info!(run_id, mode = ?mode, "driving run");

        match mode {
            TransportMode::Streaming => {
                let events = self.relay.events(request);
                self.coordinator
                    .run_streaming(&mut self.ctx, run_id, events)
                    .await;
            }
            TransportMode::Sync => {
                let started = Instant::now();
                let outcome = self.fallback.orchestrate(&request).await;
                self.coordinator
                    .apply_sync_response(&mut self.ctx, run_id, outcome.response, started.elapsed())
                    .await;
            }
        }

        Ok(run_id)
    }

    /// Snapshot of the current run's stage array.
    pub fn stages(&self) -> Option<[Stage; 5]> {
        self.ctx.current().map(|run| run.stages.clone())
    }

    /// The current run, if any.
    pub fn current_run(&self) -> Option<&RunContext> {
        self.ctx.current()
    }

    /// Aggregate response of the current run, once terminal.
    pub fn last_response(&self) -> Option<&OrchestrateResponse> {
        self.ctx.current().and_then(|run| run.response.as_ref())
    }

    /// Run history, newest first, at most 10 entries.
    pub fn history(&self) -> &[HistoryEntry] {
        self.ctx.history()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fresh_session_has_no_state() {
        let session = PipelineSession::new(RelayConfig::default()).unwrap();
        assert!(session.stages().is_none());
        assert!(session.history().is_empty());
        assert!(session.last_response().is_none());
    }
}
