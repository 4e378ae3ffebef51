//! The pipeline coordinator.
//!
//! Reduces either transport's output into ordered per-stage transitions
//! on the current run: typed stream events in streaming mode, one
//! aggregate response walked across the stages in synchronous mode.
//! Failures are scoped to the run; the coordinator never panics on
//! unexpected input.

use std::sync::Arc;
use std::time::Duration;

use futures::{pin_mut, Stream, StreamExt};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::adapters::sse::SseError;
use crate::domain::events::{AgentComplete, AgentStart, StreamEvent};
use crate::domain::run::{HistoryEntry, RunContext, RunState};
use crate::domain::stage::{StageKey, StageStatus};
use crate::domain::wire::{ContentOutput, DeliveryOutput, IntentOutput, OrchestrateResponse};

use super::history::RunHistory;
use super::observer::RunObserver;

/// Why a run failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RunFailure {
    /// The upstream reported an error event (or the relay synthesized one)
    #[error("{0}")]
    Stream(String),

    /// The stream closed before the run finished
    #[error("Stream ended unexpectedly")]
    Truncated,

    /// An event arrived out of order or could not be decoded
    #[error("Protocol violation: {0}")]
    Protocol(String),
}

/// All mutable session state: run-id counter, the current run, and the
/// history log. One per session, owned by the caller and passed by
/// reference; there is no ambient state.
#[derive(Debug, Default)]
pub struct SessionContext {
    next_run_id: u64,
    current: Option<RunContext>,
    history: RunHistory,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// The current run, if any.
    pub fn current(&self) -> Option<&RunContext> {
        self.current.as_ref()
    }

    /// History entries, newest first.
    pub fn history(&self) -> &[HistoryEntry] {
        self.history.entries()
    }

    /// The current run, if it is `run_id` and still in flight. Events
    /// addressed to anything else are stale and get discarded.
    fn live_run(&mut self, run_id: u64) -> Option<&mut RunContext> {
        self.current
            .as_mut()
            .filter(|run| run.id == run_id && !run.is_terminal())
    }
}

/// Reduces transport output into stage transitions, history entries and
/// observer notifications.
pub struct Coordinator {
    /// Cosmetic inter-stage delay for the synchronous walk; zero makes
    /// the walk instantaneous
    pacing: Duration,

    observers: Vec<Arc<dyn RunObserver>>,
}

impl Coordinator {
    pub fn new(pacing: Duration) -> Self {
        Self {
            pacing,
            observers: Vec::new(),
        }
    }

    /// Register a read-only observer.
    pub fn subscribe(&mut self, observer: Arc<dyn RunObserver>) {
        self.observers.push(observer);
    }

    /// Allocate a new run, superseding any in-flight one. The superseded
    /// run's committed stage state is not rolled back; its future events
    /// are discarded by run-id comparison and it leaves no history entry.
    pub fn begin_run(&self, ctx: &mut SessionContext, prompt: &str) -> u64 {
        ctx.next_run_id += 1;
        let run_id = ctx.next_run_id;

        if let Some(prev) = ctx.current.as_ref().filter(|run| !run.is_terminal()) {
            info!(superseded = prev.id, run_id, "superseding in-flight run");
        }

        let run = RunContext::new(run_id, prompt.to_string());
        info!(run_id, prompt, "run started");
        self.notify_stages(&run);
        ctx.current = Some(run);
        run_id
    }

    /// Drive a run from a stream of decoded upstream events.
    #[instrument(skip(self, ctx, events))]
    pub async fn run_streaming<S>(&self, ctx: &mut SessionContext, run_id: u64, events: S)
    where
        S: Stream<Item = Result<StreamEvent, SseError>>,
    {
        pin_mut!(events);

        while let Some(item) = events.next().await {
            if ctx.live_run(run_id).is_none() {
                debug!(run_id, "discarding event for superseded or finished run");
                return;
            }

            let event = match item {
                Ok(event) => event,
                Err(error) => {
                    self.fail_run(ctx, run_id, RunFailure::Protocol(error.to_string()));
                    return;
                }
            };

            match event {
                StreamEvent::AgentStart(start) => {
                    if let Err(failure) = self.on_agent_start(ctx, run_id, start) {
                        self.fail_run(ctx, run_id, failure);
                        return;
                    }
                }
                StreamEvent::AgentComplete(complete) => {
                    if let Err(failure) = self.on_agent_complete(ctx, run_id, complete) {
                        self.fail_run(ctx, run_id, failure);
                        return;
                    }
                }
                StreamEvent::Complete(response) => {
                    self.complete_run(ctx, run_id, response);
                    return;
                }
                StreamEvent::Error(error) => {
                    self.fail_run(ctx, run_id, RunFailure::Stream(error.message));
                    return;
                }
            }
        }

        // The stream closed without a terminal event
        if ctx.live_run(run_id).is_some() {
            self.fail_run(ctx, run_id, RunFailure::Truncated);
        }
    }

    /// Reduce a one-shot response into the five stages in pipeline
    /// order, each completed with an equal share of the observed elapsed
    /// time. The pacing delay between stages is purely cosmetic.
    #[instrument(skip(self, ctx, response))]
    pub async fn apply_sync_response(
        &self,
        ctx: &mut SessionContext,
        run_id: u64,
        response: OrchestrateResponse,
        elapsed: Duration,
    ) {
        if ctx.live_run(run_id).is_none() {
            debug!(run_id, "discarding response for superseded or finished run");
            return;
        }

        let stage_duration = elapsed.as_secs_f64() / 5.0;

        for key in StageKey::ALL {
            if key.index() > 0 && !self.pacing.is_zero() {
                tokio::time::sleep(self.pacing).await;
            }

            let subtitle = sync_subtitle(key, &response);
            match self.sync_stage(ctx, run_id, key, stage_duration, subtitle) {
                Ok(true) => {}
                Ok(false) => return,
                Err(failure) => {
                    self.fail_run(ctx, run_id, failure);
                    return;
                }
            }

            if key == StageKey::Classroom {
                self.celebrate_if_assigned(ctx, run_id, delivery_assigned(&response));
            }
        }

        let Some(run) = ctx.live_run(run_id) else { return };
        info!(run_id, elapsed = ?elapsed, "run completed");
        run.total_duration = Some(elapsed.as_secs_f64());
        if let Some(data) = response.data.clone() {
            run.data = data;
        }
        run.response = Some(response);
        run.state = RunState::Completed;
        self.notify_stages(run);
        self.push_history(ctx);
    }

    fn on_agent_start(
        &self,
        ctx: &mut SessionContext,
        run_id: u64,
        start: AgentStart,
    ) -> Result<(), RunFailure> {
        let Some(run) = ctx.live_run(run_id) else { return Ok(()) };

        if !run.predecessors_terminal(start.agent) {
            return Err(RunFailure::Protocol(format!(
                "stage '{}' started before its predecessor finished",
                start.agent
            )));
        }

        run.stage_mut(start.agent)
            .start(Some(start.message))
            .map_err(|error| RunFailure::Protocol(error.to_string()))?;

        debug!(run_id, stage = %start.agent, "stage running");
        self.notify_stages(run);
        Ok(())
    }

    fn on_agent_complete(
        &self,
        ctx: &mut SessionContext,
        run_id: u64,
        complete: AgentComplete,
    ) -> Result<(), RunFailure> {
        let Some(run) = ctx.live_run(run_id) else { return Ok(()) };

        // Checked up front so a violating event leaves no partial merge
        if run.stage(complete.agent).status != StageStatus::Running {
            return Err(RunFailure::Protocol(format!(
                "stage '{}' completed without running",
                complete.agent
            )));
        }

        let merged = merge_agent_result(run, complete.agent, &complete.result);
        let _ = run
            .stage_mut(complete.agent)
            .complete(complete.duration, merged.subtitle);

        debug!(run_id, stage = %complete.agent, duration = complete.duration, "stage completed");
        self.notify_stages(run);

        if merged.assigned {
            self.celebrate_if_assigned(ctx, run_id, true);
        }
        Ok(())
    }

    fn complete_run(&self, ctx: &mut SessionContext, run_id: u64, response: OrchestrateResponse) {
        let Some(run) = ctx.live_run(run_id) else { return };

        info!(run_id, total_duration = ?response.total_duration, "run completed");
        run.total_duration = response.total_duration;
        if let Some(data) = response.data.clone() {
            run.data = data;
        }
        run.response = Some(response);
        run.state = RunState::Completed;
        self.notify_stages(run);
        self.push_history(ctx);
    }

    /// Force every non-terminal stage to error with a shared subtitle
    /// and record the failed run. Committed stage state stays committed.
    fn fail_run(&self, ctx: &mut SessionContext, run_id: u64, failure: RunFailure) {
        let Some(run) = ctx.live_run(run_id) else { return };

        warn!(run_id, %failure, "run failed");
        let subtitle = failure.to_string();
        for stage in run.stages.iter_mut() {
            if !stage.is_terminal() {
                let _ = stage.fail(subtitle.clone());
            }
        }
        run.state = RunState::Failed { error: subtitle };
        self.notify_stages(run);
        self.push_history(ctx);
    }

    /// One stage of the synchronous walk: running, then completed, with
    /// a snapshot published for each committed transition. Returns
    /// Ok(false) when the run is no longer live.
    fn sync_stage(
        &self,
        ctx: &mut SessionContext,
        run_id: u64,
        key: StageKey,
        duration: f64,
        subtitle: Option<String>,
    ) -> Result<bool, RunFailure> {
        let Some(run) = ctx.live_run(run_id) else {
            return Ok(false);
        };

        run.stage_mut(key)
            .start(None)
            .map_err(|error| RunFailure::Protocol(error.to_string()))?;
        self.notify_stages(run);

        run.stage_mut(key)
            .complete(duration, subtitle)
            .map_err(|error| RunFailure::Protocol(error.to_string()))?;
        self.notify_stages(run);
        Ok(true)
    }

    /// Fire the one-shot celebration for this run, at most once.
    fn celebrate_if_assigned(&self, ctx: &mut SessionContext, run_id: u64, assigned: bool) {
        if !assigned {
            return;
        }
        let Some(run) = ctx.live_run(run_id) else { return };
        if run.celebrated {
            return;
        }
        run.celebrated = true;
        info!(run_id, "delivery assigned, firing celebration");
        for observer in &self.observers {
            observer.celebration(run_id);
        }
    }

    fn push_history(&self, ctx: &mut SessionContext) {
        let Some(run) = ctx.current.as_ref() else { return };
        let entry = HistoryEntry::from_run(run);
        ctx.history.push(entry);
        for observer in &self.observers {
            observer.history_changed(ctx.history.entries());
        }
    }

    fn notify_stages(&self, run: &RunContext) {
        for observer in &self.observers {
            observer.stages_changed(run.id, run.stages.clone());
        }
    }
}

struct MergedResult {
    subtitle: Option<String>,
    assigned: bool,
}

/// Interpret a per-agent result payload, merging what it carries into
/// the run's accumulated data and deriving the completed subtitle.
///
/// Payload shapes differ per agent and per intent type; an interior that
/// does not match is skipped (the stage still completes with its
/// last-known subtitle) so upstream additions pass through.
fn merge_agent_result(
    run: &mut RunContext,
    agent: StageKey,
    result: &serde_json::Value,
) -> MergedResult {
    let mut merged = MergedResult {
        subtitle: None,
        assigned: false,
    };

    match agent {
        StageKey::Intent => {
            if let Ok(intent) = serde_json::from_value::<IntentOutput>(result.clone()) {
                run.data.intent = Some(intent);
            }
            merged.subtitle = Some("Request analyzed".to_string());
        }
        StageKey::Content => {
            if let Ok(content) = serde_json::from_value::<ContentOutput>(result.clone()) {
                merged.subtitle = Some(format!("Extracted {} key topics", content.key_topics.len()));
                run.data.content = Some(content);
            }
        }
        StageKey::Quiz => {
            if let Some(count) = result.get("num_questions").and_then(serde_json::Value::as_u64) {
                run.question_count = Some(count as usize);
                merged.subtitle = Some(format!("Generated {count} questions"));
            }
        }
        StageKey::Forms => {
            if let Some(url) = result.get("form_url").and_then(serde_json::Value::as_str) {
                run.data.form_url = Some(url.to_string());
                merged.subtitle = Some("Google Form created".to_string());
            }
            if let Some(id) = result.get("form_id").and_then(serde_json::Value::as_str) {
                run.data.form_id = Some(id.to_string());
            }
        }
        StageKey::Classroom => {
            if let Ok(delivery) = serde_json::from_value::<DeliveryOutput>(result.clone()) {
                merged.subtitle = Some(format!(
                    "{} ({})",
                    delivery.delivery_status, delivery.mode
                ));
                merged.assigned = delivery.is_assigned();
                run.data.delivery = Some(delivery);
            }
        }
    }

    merged
}

/// Completed-stage subtitle for the synchronous walk, derived from
/// whichever optional fields the response carries. `None` keeps the
/// stage's default description.
fn sync_subtitle(key: StageKey, response: &OrchestrateResponse) -> Option<String> {
    let data = response.data.as_ref();
    match key {
        StageKey::Intent => Some("Request analyzed".to_string()),
        StageKey::Content => data?
            .content
            .as_ref()
            .map(|content| format!("Extracted {} key topics", content.key_topics.len())),
        StageKey::Quiz => data?
            .questions
            .as_ref()
            .map(|questions| format!("Generated {} questions", questions.len())),
        StageKey::Forms => data?
            .form_url
            .as_ref()
            .map(|_| "Google Form created".to_string()),
        StageKey::Classroom => data?
            .delivery
            .as_ref()
            .map(|delivery| format!("{} ({})", delivery.delivery_status, delivery.mode)),
    }
}

fn delivery_assigned(response: &OrchestrateResponse) -> bool {
    response
        .data
        .as_ref()
        .and_then(|data| data.delivery.as_ref())
        .map(DeliveryOutput::is_assigned)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_ids_are_monotonic() {
        let coordinator = Coordinator::new(Duration::ZERO);
        let mut ctx = SessionContext::new();

        let first = coordinator.begin_run(&mut ctx, "one");
        let second = coordinator.begin_run(&mut ctx, "two");
        assert!(second > first);
        assert_eq!(ctx.current().unwrap().id, second);
    }

    #[test]
    fn test_begin_run_resets_stages() {
        let coordinator = Coordinator::new(Duration::ZERO);
        let mut ctx = SessionContext::new();

        coordinator.begin_run(&mut ctx, "one");
        ctx.current
            .as_mut()
            .unwrap()
            .stage_mut(StageKey::Intent)
            .start(None)
            .unwrap();

        coordinator.begin_run(&mut ctx, "two");
        let run = ctx.current().unwrap();
        assert!(run
            .stages
            .iter()
            .all(|stage| stage.status == StageStatus::Pending));
    }

    #[test]
    fn test_sync_subtitles() {
        let mut response = OrchestrateResponse::default();
        assert_eq!(
            sync_subtitle(StageKey::Intent, &response).as_deref(),
            Some("Request analyzed")
        );
        assert_eq!(sync_subtitle(StageKey::Quiz, &response), None);

        response.data = Some(crate::domain::wire::ResponseData {
            questions: Some(vec![]),
            form_url: Some("https://forms.example/f".to_string()),
            ..Default::default()
        });
        assert_eq!(
            sync_subtitle(StageKey::Quiz, &response).as_deref(),
            Some("Generated 0 questions")
        );
        assert_eq!(
            sync_subtitle(StageKey::Forms, &response).as_deref(),
            Some("Google Form created")
        );
    }

    // Full scenario coverage (ordering violations, truncation,
    // supersession, celebration) lives in tests/coordinator.rs.
}
