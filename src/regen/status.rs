//! Transient regeneration state, events and batch results.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use uuid::Uuid;

/// Execution state of one snippet's regeneration.
///
/// Lives in memory only and is separate from the persisted dirty flag.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RegenerationStatus {
    #[default]
    Idle,
    InProgress,
    Success,
    Error(String),
}

impl RegenerationStatus {
    /// Whether the snippet has reached success or error.
    #[must_use]
    pub const fn is_settled(&self) -> bool {
        matches!(self, Self::Success | Self::Error(_))
    }
}

impl fmt::Display for RegenerationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::InProgress => write!(f, "in progress"),
            Self::Success => write!(f, "success"),
            Self::Error(message) => write!(f, "error: {message}"),
        }
    }
}

/// Progress signals published while batches run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegenerationEvent {
    BatchStarted {
        batch_id: Uuid,
        targets: Vec<String>,
    },
    WaveStarted {
        batch_id: Uuid,
        index: usize,
        names: Vec<String>,
    },
    /// Per-snippet completion signal (and the in-progress transition).
    SnippetStatus {
        name: String,
        status: RegenerationStatus,
    },
    /// Per-batch completion signal.
    BatchFinished {
        report: BatchReport,
    },
}

/// Outcome of one regeneration batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
    pub batch_id: Uuid,
    /// Snippets regenerated (or cleared for a blank prompt).
    pub succeeded: BTreeSet<String>,
    /// Snippets whose regeneration was attempted or aborted, with the error.
    pub failed: BTreeMap<String, String>,
    /// Snippets not attempted, with the reason.
    pub skipped: BTreeMap<String, String>,
}

impl BatchReport {
    #[must_use]
    pub fn new(batch_id: Uuid) -> Self {
        Self {
            batch_id,
            succeeded: BTreeSet::new(),
            failed: BTreeMap::new(),
            skipped: BTreeMap::new(),
        }
    }

    /// True when every target regenerated.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.skipped.is_empty()
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len() + self.skipped.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display_and_settled() {
        assert_eq!(RegenerationStatus::default(), RegenerationStatus::Idle);
        assert!(!RegenerationStatus::InProgress.is_settled());
        assert!(RegenerationStatus::Success.is_settled());

        let error = RegenerationStatus::Error("boom".to_string());
        assert!(error.is_settled());
        assert_eq!(error.to_string(), "error: boom");
    }

    #[test]
    fn test_report_counts() {
        let mut report = BatchReport::new(Uuid::new_v4());
        assert!(report.is_success());

        report.succeeded.insert("a".to_string());
        report.skipped.insert("b".to_string(), "Dependency '@c' failed to regenerate".to_string());
        report.failed.insert("c".to_string(), "boom".to_string());
        assert_eq!(report.total(), 3);
        assert!(!report.is_success());
    }
}
