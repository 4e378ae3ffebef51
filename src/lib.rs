//! edusphere - Orchestration relay and pipeline coordinator
//!
//! A boundary layer between the EduSphere dashboard and its upstream
//! orchestrator. It proxies the live event stream without buffering,
//! degrades to a deterministic mock response when the upstream is
//! unreachable, and reconciles either transport into one ordered
//! per-stage state machine.
//!
//! # Architecture
//!
//! - All run state lives in a single owned `SessionContext`; the
//!   coordinator mutates it, renderers read immutable snapshots
//! - Stage transitions are monotone and always observed in pipeline
//!   order, for both transports
//! - Failures are scoped to the run that caused them: non-terminal
//!   stages are forced to error and the run lands in the bounded
//!   history log
//!
//! # Modules
//!
//! - `adapters`: Upstream HTTP boundary (stream relay, fallback adapter, SSE codec)
//! - `core`: Coordination logic (Coordinator, SessionContext, RunHistory, PipelineSession)
//! - `domain`: Data structures (Stage, StreamEvent, RunContext, wire types)
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Drive a run over the event stream
//! edusphere run "Create a 10 question quiz on Newton's Laws"
//!
//! # Drive a run over the one-shot transport
//! edusphere run --sync "Create a quiz on photosynthesis for grade 8"
//!
//! # Probe the upstream
//! edusphere health
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;

// Re-export main types at crate root for convenience
pub use adapters::{FallbackAdapter, FallbackOutcome, SseDecoder, SseError, StreamRelay, Transport};
pub use config::RelayConfig;
pub use core::{
    Coordinator, PipelineSession, RunFailure, RunObserver, SessionContext, SessionError,
    TransportMode, HISTORY_LIMIT,
};
pub use domain::{
    initial_stages, mock_response, HistoryEntry, OrchestrateRequest, OrchestrateResponse,
    RunContext, RunState, Stage, StageKey, StageStatus, StreamEvent,
};
