//! State machine transition validation for workflow and node statuses.

use crate::error::ExecutionError;
use crate::node_status::NodeStatus;
use crate::status::WorkflowStatus;

/// Returns `true` if the workflow-level transition from `from` to `to` is valid.
#[must_use]
pub fn can_transition_workflow(from: WorkflowStatus, to: WorkflowStatus) -> bool {
    matches!(
        (from, to),
        (WorkflowStatus::Pending, WorkflowStatus::Running)
            | (WorkflowStatus::Running, WorkflowStatus::Paused)
            | (WorkflowStatus::Running, WorkflowStatus::Completed)
            | (WorkflowStatus::Running, WorkflowStatus::Failed)
            | (WorkflowStatus::Running, WorkflowStatus::Cancelled)
            | (WorkflowStatus::Paused, WorkflowStatus::Running)
            | (WorkflowStatus::Paused, WorkflowStatus::Cancelled)
            // RetryNode may reopen a Failed workflow to dispatch the retried
            // node and whatever its retry unblocks.
            | (WorkflowStatus::Failed, WorkflowStatus::Running)
    )
}

/// Validate a workflow-level transition, returning an error if invalid.
pub fn validate_workflow_transition(
    from: WorkflowStatus,
    to: WorkflowStatus,
) -> Result<(), ExecutionError> {
    if can_transition_workflow(from, to) {
        Ok(())
    } else {
        Err(ExecutionError::InvalidWorkflowTransition { from, to })
    }
}

/// Returns `true` if the node-level transition from `from` to `to` is valid.
///
/// Follows §3's rule directly: `Running` is reachable only from `Pending` or
/// `Retrying`; `WaitingForInput` only from `Running`; the three terminal
/// statuses only from `Running` or `WaitingForInput`. `Failed -> Retrying`
/// and `Pending -> Skipped` are the two facade-initiated exceptions
/// (`RetryNode`, `SkipNode`).
#[must_use]
pub fn can_transition_node(from: NodeStatus, to: NodeStatus) -> bool {
    use NodeStatus::{Completed, Failed, Pending, Retrying, Running, Skipped, WaitingForInput};

    matches!(
        (from, to),
        (Pending, Running)
            | (Retrying, Running)
            | (Running, WaitingForInput)
            | (WaitingForInput, Running)
            | (Running, Completed)
            | (Running, Failed)
            | (Running, Skipped)
            | (WaitingForInput, Completed)
            | (WaitingForInput, Failed)
            | (WaitingForInput, Skipped)
            | (Failed, Retrying)
            | (Pending, Skipped)
    )
}

/// Validate a node-level transition, returning an error if invalid.
pub fn validate_node_transition(from: NodeStatus, to: NodeStatus) -> Result<(), ExecutionError> {
    if can_transition_node(from, to) {
        Ok(())
    } else {
        Err(ExecutionError::InvalidNodeTransition { from, to })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_workflow_transitions() {
        assert!(can_transition_workflow(
            WorkflowStatus::Pending,
            WorkflowStatus::Running
        ));
        assert!(can_transition_workflow(
            WorkflowStatus::Running,
            WorkflowStatus::Completed
        ));
        assert!(can_transition_workflow(
            WorkflowStatus::Running,
            WorkflowStatus::Failed
        ));
        assert!(can_transition_workflow(
            WorkflowStatus::Running,
            WorkflowStatus::Paused
        ));
        assert!(can_transition_workflow(
            WorkflowStatus::Paused,
            WorkflowStatus::Running
        ));
        assert!(can_transition_workflow(
            WorkflowStatus::Paused,
            WorkflowStatus::Cancelled
        ));
    }

    #[test]
    fn invalid_workflow_transitions() {
        assert!(!can_transition_workflow(
            WorkflowStatus::Pending,
            WorkflowStatus::Completed
        ));
        assert!(!can_transition_workflow(
            WorkflowStatus::Completed,
            WorkflowStatus::Running
        ));
        assert!(!can_transition_workflow(
            WorkflowStatus::Cancelled,
            WorkflowStatus::Running
        ));
        assert!(!can_transition_workflow(
            WorkflowStatus::Pending,
            WorkflowStatus::Pending
        ));
    }

    #[test]
    fn validate_workflow_transition_err_message() {
        let err =
            validate_workflow_transition(WorkflowStatus::Completed, WorkflowStatus::Running)
                .unwrap_err();
        assert!(err.to_string().contains("invalid workflow transition"));
    }

    #[test]
    fn valid_node_transitions() {
        assert!(can_transition_node(NodeStatus::Pending, NodeStatus::Running));
        assert!(can_transition_node(
            NodeStatus::Running,
            NodeStatus::WaitingForInput
        ));
        assert!(can_transition_node(
            NodeStatus::WaitingForInput,
            NodeStatus::Running
        ));
        assert!(can_transition_node(NodeStatus::Running, NodeStatus::Completed));
        assert!(can_transition_node(NodeStatus::Running, NodeStatus::Failed));
        assert!(can_transition_node(NodeStatus::Failed, NodeStatus::Retrying));
        assert!(can_transition_node(NodeStatus::Retrying, NodeStatus::Running));
        assert!(can_transition_node(NodeStatus::Pending, NodeStatus::Skipped));
    }

    #[test]
    fn invalid_node_transitions() {
        assert!(!can_transition_node(NodeStatus::Pending, NodeStatus::WaitingForInput));
        assert!(!can_transition_node(NodeStatus::Pending, NodeStatus::Completed));
        assert!(!can_transition_node(NodeStatus::Completed, NodeStatus::Running));
        assert!(!can_transition_node(NodeStatus::Skipped, NodeStatus::Running));
        assert!(!can_transition_node(NodeStatus::Failed, NodeStatus::Completed));
    }
}
