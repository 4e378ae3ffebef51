//! Typed events consumed from the upstream event stream.
//!
//! Raw SSE frames are decoded into these variants exactly once, at the
//! relay boundary; the coordinator never sees frame text.

use serde::{Deserialize, Serialize};

use super::stage::StageKey;
use super::wire::OrchestrateResponse;

/// One logical pipeline event from the upstream orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// A stage began executing (`agent_start`)
    AgentStart(AgentStart),

    /// A stage finished executing (`agent_complete`)
    AgentComplete(AgentComplete),

    /// The run finished; carries the full aggregate result including the
    /// upstream-measured `total_duration` (`complete`)
    Complete(OrchestrateResponse),

    /// The upstream (or the relay, synthetically) reported a failure (`error`)
    Error(StreamError),
}

/// Payload of an `agent_start` frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentStart {
    pub agent: StageKey,
    pub message: String,
}

/// Payload of an `agent_complete` frame.
///
/// `result` stays a raw JSON value here; its shape differs per agent and
/// the coordinator interprets it against the stage key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentComplete {
    pub agent: StageKey,
    pub duration: f64,
    #[serde(default)]
    pub result: serde_json::Value,
}

/// Payload of an `error` frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamError {
    pub message: String,
}

impl StreamEvent {
    /// Stage this event addresses, if it is stage-scoped.
    pub fn stage(&self) -> Option<StageKey> {
        match self {
            StreamEvent::AgentStart(e) => Some(e.agent),
            StreamEvent::AgentComplete(e) => Some(e.agent),
            StreamEvent::Complete(_) | StreamEvent::Error(_) => None,
        }
    }
}
