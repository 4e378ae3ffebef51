//! Per-invocation run state and the history record it leaves behind.
//!
//! A RunContext represents a single end-to-end invocation of the
//! five-stage pipeline for one prompt.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::stage::{initial_stages, Stage, StageKey};
use super::wire::{OrchestrateResponse, ResponseData};

/// State of a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum RunState {
    /// Currently executing
    Running,

    /// Completed (terminal)
    Completed,

    /// Failed with error (terminal)
    Failed { error: String },
}

impl Default for RunState {
    fn default() -> Self {
        Self::Running
    }
}

/// One invocation of the pipeline.
///
/// Exactly one RunContext is current at a time; it lives in the session
/// context and is replaced (not rolled back) when a newer run supersedes
/// it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunContext {
    /// Monotonically increasing run id, unique within the session
    pub id: u64,

    /// The prompt this run was started with
    pub prompt: String,

    /// When the run started
    pub started_at: DateTime<Utc>,

    /// The 5 pipeline stages, in pipeline order
    pub stages: [Stage; 5],

    /// Current state of the run
    pub state: RunState,

    /// Per-agent results merged as they arrive
    pub data: ResponseData,

    /// Full aggregate response, present once the run finished
    pub response: Option<OrchestrateResponse>,

    /// Total wall-clock duration in seconds, present once terminal
    pub total_duration: Option<f64>,

    /// Question count witnessed during the run (streaming runs learn it
    /// from the quiz stage before the aggregate arrives)
    pub question_count: Option<usize>,

    /// Whether the one-shot celebration signal already fired for this run
    pub celebrated: bool,
}

impl RunContext {
    /// Create a fresh run with all stages pending.
    pub fn new(id: u64, prompt: String) -> Self {
        Self {
            id,
            prompt,
            started_at: Utc::now(),
            stages: initial_stages(),
            state: RunState::Running,
            data: ResponseData::default(),
            response: None,
            total_duration: None,
            question_count: None,
            celebrated: false,
        }
    }

    /// Mutable access to one stage by key.
    pub fn stage_mut(&mut self, key: StageKey) -> &mut Stage {
        &mut self.stages[key.index()]
    }

    /// Shared access to one stage by key.
    pub fn stage(&self, key: StageKey) -> &Stage {
        &self.stages[key.index()]
    }

    /// Whether every stage before `key` has reached a terminal status.
    pub fn predecessors_terminal(&self, key: StageKey) -> bool {
        self.stages[..key.index()].iter().all(Stage::is_terminal)
    }

    /// Whether the run itself reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        !matches!(self.state, RunState::Running)
    }

    /// Success flag for the history record: the aggregate response's own
    /// flag for finished runs, false for failed ones.
    pub fn succeeded(&self) -> bool {
        match self.state {
            RunState::Completed => self.response.as_ref().map(|r| r.success).unwrap_or(false),
            _ => false,
        }
    }
}

/// Immutable record of a finished run, kept in the bounded history log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Run id this entry summarizes
    pub id: u64,

    /// The prompt that started the run
    pub prompt: String,

    /// When the entry was created
    pub timestamp: DateTime<Utc>,

    /// Whether the run succeeded
    pub success: bool,

    /// Form URL, when one was created
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form_url: Option<String>,

    /// Number of generated questions, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_count: Option<usize>,
}

impl HistoryEntry {
    /// Summarize a terminal run.
    pub fn from_run(run: &RunContext) -> Self {
        let form_url = run
            .response
            .as_ref()
            .and_then(|r| r.form_url().map(String::from))
            .or_else(|| run.data.form_url.clone());

        let question_count = run
            .response
            .as_ref()
            .and_then(OrchestrateResponse::question_count)
            .or(run.question_count);

        Self {
            id: run.id,
            prompt: run.prompt.clone(),
            timestamp: Utc::now(),
            success: run.succeeded(),
            form_url,
            question_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::stage::StageStatus;
    use crate::domain::wire::mock_response;

    #[test]
    fn test_new_run_is_pending_everywhere() {
        let run = RunContext::new(1, "quiz me".to_string());
        assert_eq!(run.id, 1);
        assert!(!run.is_terminal());
        assert!(run
            .stages
            .iter()
            .all(|s| s.status == StageStatus::Pending));
        assert!(run.response.is_none());
        assert!(!run.celebrated);
    }

    #[test]
    fn test_predecessors_terminal() {
        let mut run = RunContext::new(1, "p".to_string());
        // Intent has no predecessors
        assert!(run.predecessors_terminal(StageKey::Intent));
        assert!(!run.predecessors_terminal(StageKey::Content));

        run.stage_mut(StageKey::Intent).start(Some("x".to_string())).unwrap();
        assert!(!run.predecessors_terminal(StageKey::Content));

        run.stage_mut(StageKey::Intent).complete(0.1, None).unwrap();
        assert!(run.predecessors_terminal(StageKey::Content));
        assert!(!run.predecessors_terminal(StageKey::Quiz));
    }

    #[test]
    fn test_succeeded_follows_response_flag() {
        let mut run = RunContext::new(1, "p".to_string());
        assert!(!run.succeeded());

        run.state = RunState::Completed;
        run.response = Some(mock_response());
        assert!(run.succeeded());

        run.state = RunState::Failed {
            error: "boom".to_string(),
        };
        assert!(!run.succeeded());
    }

    #[test]
    fn test_history_entry_prefers_aggregate_response() {
        let mut run = RunContext::new(7, "Create a quiz".to_string());
        run.state = RunState::Completed;
        run.question_count = Some(3);
        run.response = Some(mock_response());

        let entry = HistoryEntry::from_run(&run);
        assert_eq!(entry.id, 7);
        assert!(entry.success);
        // The mock aggregate carries exactly one question
        assert_eq!(entry.question_count, Some(1));
        assert!(entry.form_url.is_none());
    }

    #[test]
    fn test_history_entry_falls_back_to_partial_data() {
        let mut run = RunContext::new(8, "p".to_string());
        run.state = RunState::Failed {
            error: "truncated".to_string(),
        };
        run.data.form_url = Some("https://forms.example/partial".to_string());
        run.question_count = Some(5);

        let entry = HistoryEntry::from_run(&run);
        assert!(!entry.success);
        assert_eq!(entry.form_url.as_deref(), Some("https://forms.example/partial"));
        assert_eq!(entry.question_count, Some(5));
    }
}
