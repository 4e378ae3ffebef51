//! The fixed five-stage pipeline catalog and per-stage state machine.
//!
//! Stage status transitions are monotone: pending -> running ->
//! {completed, error}. A transition is never reversed; illegal
//! transitions are reported as errors and left unapplied.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identity of a pipeline stage, in fixed pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKey {
    /// Intent detection
    Intent,

    /// Content extraction
    Content,

    /// Question generation
    Quiz,

    /// Form creation
    Forms,

    /// Classroom delivery
    Classroom,
}

impl StageKey {
    /// All stage keys in pipeline order.
    pub const ALL: [StageKey; 5] = [
        StageKey::Intent,
        StageKey::Content,
        StageKey::Quiz,
        StageKey::Forms,
        StageKey::Classroom,
    ];

    /// Position of this stage in the pipeline (0-based).
    pub fn index(self) -> usize {
        match self {
            StageKey::Intent => 0,
            StageKey::Content => 1,
            StageKey::Quiz => 2,
            StageKey::Forms => 3,
            StageKey::Classroom => 4,
        }
    }

    /// Human-readable stage title.
    pub fn title(self) -> &'static str {
        match self {
            StageKey::Intent => "Intent Agent",
            StageKey::Content => "Content Agent",
            StageKey::Quiz => "Quiz Agent",
            StageKey::Forms => "Forms Agent",
            StageKey::Classroom => "Classroom Agent",
        }
    }

    /// Default description shown while the stage has not reported anything.
    pub fn default_subtitle(self) -> &'static str {
        match self {
            StageKey::Intent => "Analyzing your request...",
            StageKey::Content => "Extracting key academic topics...",
            StageKey::Quiz => "Generating questions with AI...",
            StageKey::Forms => "Creating Google Form...",
            StageKey::Classroom => "Assigning to Google Classroom...",
        }
    }

    /// Wire name used by the upstream event protocol.
    pub fn as_str(self) -> &'static str {
        match self {
            StageKey::Intent => "intent",
            StageKey::Content => "content",
            StageKey::Quiz => "quiz",
            StageKey::Forms => "forms",
            StageKey::Classroom => "classroom",
        }
    }
}

impl std::fmt::Display for StageKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a single stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// Not yet started
    Pending,

    /// Currently executing
    Running,

    /// Completed successfully (terminal)
    Completed,

    /// Failed (terminal)
    Error,
}

impl Default for StageStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl StageStatus {
    /// Completed or error.
    pub fn is_terminal(self) -> bool {
        matches!(self, StageStatus::Completed | StageStatus::Error)
    }
}

/// Attempted stage transition that would violate monotonicity.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("illegal stage transition for '{stage}': {from:?} -> {to:?}")]
pub struct IllegalTransition {
    pub stage: StageKey,
    pub from: StageStatus,
    pub to: StageStatus,
}

/// One entry of the pipeline timeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stage {
    /// Immutable identity
    pub key: StageKey,

    /// Human-readable title
    pub title: String,

    /// Last-known description, updated as the stage reports progress
    pub subtitle: String,

    /// Current status
    pub status: StageStatus,

    /// Seconds spent in this stage, present only once terminal
    pub duration: Option<f64>,
}

impl Stage {
    /// Create a fresh pending stage from the catalog defaults.
    pub fn new(key: StageKey) -> Self {
        Self {
            key,
            title: key.title().to_string(),
            subtitle: key.default_subtitle().to_string(),
            status: StageStatus::Pending,
            duration: None,
        }
    }

    fn illegal(&self, to: StageStatus) -> IllegalTransition {
        IllegalTransition {
            stage: self.key,
            from: self.status,
            to,
        }
    }

    /// pending -> running. A `None` subtitle keeps the catalog default.
    pub fn start(&mut self, subtitle: Option<String>) -> Result<(), IllegalTransition> {
        if self.status != StageStatus::Pending {
            return Err(self.illegal(StageStatus::Running));
        }
        self.status = StageStatus::Running;
        if let Some(subtitle) = subtitle {
            self.subtitle = subtitle;
        }
        Ok(())
    }

    /// running -> completed, recording the duration. A `None` subtitle
    /// keeps the last-known description.
    pub fn complete(
        &mut self,
        duration: f64,
        subtitle: Option<String>,
    ) -> Result<(), IllegalTransition> {
        if self.status != StageStatus::Running {
            return Err(self.illegal(StageStatus::Completed));
        }
        self.status = StageStatus::Completed;
        self.duration = Some(duration.max(0.0));
        if let Some(subtitle) = subtitle {
            self.subtitle = subtitle;
        }
        Ok(())
    }

    /// Any non-terminal state -> error. Terminal stages are left untouched.
    pub fn fail(&mut self, subtitle: impl Into<String>) -> Result<(), IllegalTransition> {
        if self.status.is_terminal() {
            return Err(self.illegal(StageStatus::Error));
        }
        self.status = StageStatus::Error;
        self.subtitle = subtitle.into();
        Ok(())
    }

    /// Completed or error.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// The 5-element stage catalog, reset to pending.
pub fn initial_stages() -> [Stage; 5] {
    StageKey::ALL.map(Stage::new)
}
