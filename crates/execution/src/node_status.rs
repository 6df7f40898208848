//! Node-level execution status.

use serde::{Deserialize, Serialize};

/// The status of a single node within a running workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    /// Not yet eligible to run; waiting on predecessors or admission.
    Pending,
    /// Currently executing.
    Running,
    /// Suspended awaiting a `CompleteUIInteraction` call.
    WaitingForInput,
    /// Finished successfully.
    Completed,
    /// Finished unsuccessfully.
    Failed,
    /// Excluded from this run, counts as satisfied for dependency purposes.
    Skipped,
    /// Re-dispatched via a user-initiated retry.
    Retrying,
}

impl NodeStatus {
    /// Returns `true` if the node has reached a final state for this run.
    ///
    /// `WaitingForInput` is intentionally excluded: a session is retained
    /// while any node is waiting on input, even once every other node has
    /// drained.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Skipped)
    }

    /// Returns `true` if the node currently occupies a concurrency slot.
    #[must_use]
    pub fn is_active(self) -> bool {
        matches!(self, Self::Running | Self::Retrying)
    }

    /// Returns `true` if this status satisfies a downstream dependency.
    #[must_use]
    pub fn satisfies_dependency(self) -> bool {
        matches!(self, Self::Completed | Self::Skipped)
    }
}

impl std::fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::WaitingForInput => write!(f, "waiting_for_input"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Skipped => write!(f, "skipped"),
            Self::Retrying => write!(f, "retrying"),
        }
    }
}
