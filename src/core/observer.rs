//! Notification interface for the rendering surface.
//!
//! The coordinator publishes owned snapshots after every committed
//! transition; observers never receive a mutable reference into
//! coordinator-owned state.

use crate::domain::run::HistoryEntry;
use crate::domain::stage::Stage;

/// Read-only subscriber to coordinator state changes.
///
/// All methods default to no-ops so an observer only implements what it
/// renders.
pub trait RunObserver: Send + Sync {
    /// The current run's stage array changed.
    fn stages_changed(&self, _run_id: u64, _stages: [Stage; 5]) {}

    /// The run-history log changed (newest first, length <= 10).
    fn history_changed(&self, _history: &[HistoryEntry]) {}

    /// One-shot success signal: the final stage reported a positive
    /// delivery outcome. Fires at most once per run id.
    fn celebration(&self, _run_id: u64) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Silent;
    impl RunObserver for Silent {}

    #[test]
    fn test_default_methods_are_noops() {
        let observer = Silent;
        observer.stages_changed(1, crate::domain::stage::initial_stages());
        observer.history_changed(&[]);
        observer.celebration(1);
    }
}
