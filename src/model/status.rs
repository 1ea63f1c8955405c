//! Workflow run lifecycle states.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The lifecycle state of a workflow run.
///
/// Transitions only move forward: `Scheduled -> Running -> {Finished,
/// Failed, Killed}`. A terminal state is sticky; cleanup operations on an
/// already-terminal run are no-ops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    /// The run has been created but not started.
    Scheduled,
    /// The run is in progress.
    Running,
    /// The run completed successfully.
    Finished,
    /// The run failed.
    Failed,
    /// The run was cancelled.
    Killed,
}

impl Default for RunStatus {
    fn default() -> Self {
        Self::Scheduled
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scheduled => write!(f, "SCHEDULED"),
            Self::Running => write!(f, "RUNNING"),
            Self::Finished => write!(f, "FINISHED"),
            Self::Failed => write!(f, "FAILED"),
            Self::Killed => write!(f, "KILLED"),
        }
    }
}

impl RunStatus {
    /// Returns true if the status represents a terminal state.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Failed | Self::Killed)
    }

    /// Returns true if the status indicates failure.
    #[must_use]
    pub const fn is_failure(self) -> bool {
        matches!(self, Self::Failed | Self::Killed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(RunStatus::Scheduled.to_string(), "SCHEDULED");
        assert_eq!(RunStatus::Finished.to_string(), "FINISHED");
        assert_eq!(RunStatus::Killed.to_string(), "KILLED");
    }

    #[test]
    fn test_terminal_states() {
        assert!(!RunStatus::Scheduled.is_terminal());
        assert!(!RunStatus::Running.is_terminal());
        assert!(RunStatus::Finished.is_terminal());
        assert!(RunStatus::Failed.is_terminal());
        assert!(RunStatus::Killed.is_terminal());
    }

    #[test]
    fn test_failure_states() {
        assert!(!RunStatus::Finished.is_failure());
        assert!(RunStatus::Failed.is_failure());
        assert!(RunStatus::Killed.is_failure());
    }
}
