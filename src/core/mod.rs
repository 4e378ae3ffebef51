//! Core coordination logic.
//!
//! This module contains:
//! - Coordinator: the per-stage state machine over both transports
//! - SessionContext: the single owned home of all mutable run state
//! - RunHistory: bounded newest-first log of finished runs
//! - RunObserver: read-only notification interface for renderers
//! - PipelineSession: the run-triggering boundary with its run guard

pub mod coordinator;
pub mod history;
pub mod observer;
pub mod session;

// Re-export commonly used types
pub use coordinator::{Coordinator, RunFailure, SessionContext};
pub use history::{RunHistory, HISTORY_LIMIT};
pub use observer::RunObserver;
pub use session::{PipelineSession, SessionError, TransportMode};
