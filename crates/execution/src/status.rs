//! Workflow-level execution status.

use serde::{Deserialize, Serialize};

/// The overall status of a workflow execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    /// Created but not yet started.
    Pending,
    /// Actively dispatching and running nodes.
    Running,
    /// Cancellation or a user pause has suspended the session.
    Paused,
    /// Every enabled node reached `Completed` or `Skipped`.
    Completed,
    /// At least one enabled node failed and `ContinueOnError` is false.
    Failed,
    /// Cancelled before reaching a terminal state on its own.
    Cancelled,
}

impl WorkflowStatus {
    /// Returns `true` if the execution has reached a final state.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Returns `true` if the execution is actively dispatching work.
    #[must_use]
    pub fn is_active(self) -> bool {
        matches!(self, Self::Running)
    }

    /// Returns `true` if the execution completed successfully.
    #[must_use]
    pub fn is_success(self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Returns `true` if the execution ended in failure.
    #[must_use]
    pub fn is_failure(self) -> bool {
        matches!(self, Self::Failed)
    }
}

impl std::fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Paused => write!(f, "paused"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}
