//! Domain types for the orchestration relay and pipeline coordinator.
//!
//! This module contains the core data structures:
//! - Stage: the fixed five-stage catalog and its status machine
//! - Events: typed upstream stream events
//! - Run: per-invocation run state and history records
//! - Wire: the upstream HTTP JSON contract

pub mod events;
pub mod run;
pub mod stage;
pub mod wire;

// Re-export commonly used types
pub use events::{AgentComplete, AgentStart, StreamError, StreamEvent};
pub use run::{HistoryEntry, RunContext, RunState};
pub use stage::{initial_stages, IllegalTransition, Stage, StageKey, StageStatus};
pub use wire::{
    mock_response, ContentOutput, DeliveryOutput, IntentOutput, OrchestrateRequest,
    OrchestrateResponse, QuizQuestion, ResponseData, DELIVERY_ASSIGNED,
};
