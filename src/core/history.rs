//! Bounded, newest-first log of finished runs.
//!
//! The coordinator is the only writer; everything else reads snapshots.
//! Nothing is persisted: the log lives and dies with the session.

use crate::domain::run::HistoryEntry;

/// Maximum number of entries retained.
pub const HISTORY_LIMIT: usize = 10;

/// Append-only bounded run history, newest first.
#[derive(Debug, Default, Clone)]
pub struct RunHistory {
    entries: Vec<HistoryEntry>,
}

impl RunHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a finished run at the head, silently dropping the oldest
    /// entry beyond the limit.
    pub fn push(&mut self, entry: HistoryEntry) {
        self.entries.insert(0, entry);
        self.entries.truncate(HISTORY_LIMIT);
    }

    /// Entries, newest first.
    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn entry(id: u64) -> HistoryEntry {
        HistoryEntry {
            id,
            prompt: format!("prompt {id}"),
            timestamp: Utc::now(),
            success: true,
            form_url: None,
            question_count: None,
        }
    }

    #[test]
    fn test_newest_first() {
        let mut history = RunHistory::new();
        history.push(entry(1));
        history.push(entry(2));
        history.push(entry(3));

        let ids: Vec<u64> = history.entries().iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![3, 2, 1]);
    }

    #[test]
    fn test_truncates_to_limit() {
        let mut history = RunHistory::new();
        for id in 1..=15 {
            history.push(entry(id));
        }

        assert_eq!(history.len(), HISTORY_LIMIT);
        let ids: Vec<u64> = history.entries().iter().map(|e| e.id).collect();
        assert_eq!(ids, (6..=15).rev().collect::<Vec<u64>>());
    }

    #[test]
    fn test_empty() {
        let history = RunHistory::new();
        assert!(history.is_empty());
        assert!(history.entries().is_empty());
    }
}
