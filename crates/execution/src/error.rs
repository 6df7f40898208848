//! Execution error types: the operational `ExecutionError` this crate's own
//! operations can fail with, and the domain error taxonomy (§8) recorded on
//! nodes and workflows as part of their persisted state.

use flux_core::NodeId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::node_status::NodeStatus;
use crate::status::WorkflowStatus;

/// Errors raised by this crate's own state-machine and planning operations.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// A workflow-level state transition is not valid for the current status.
    #[error("invalid workflow transition from {from} to {to}")]
    InvalidWorkflowTransition {
        /// Current status.
        from: WorkflowStatus,
        /// Attempted target status.
        to: WorkflowStatus,
    },

    /// A node-level state transition is not valid for the current status.
    #[error("invalid node transition from {from} to {to}")]
    InvalidNodeTransition {
        /// Current status.
        from: NodeStatus,
        /// Attempted target status.
        to: NodeStatus,
    },

    /// A referenced node does not exist in the execution state.
    #[error("node not found: {0}")]
    NodeNotFound(NodeId),

    /// The execution plan failed validation.
    #[error("plan validation: {0}")]
    PlanValidation(String),

    /// A serialization or deserialization error.
    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The execution was cancelled.
    #[error("execution cancelled")]
    Cancelled,

    /// A node's required user input has no value in the execution context.
    #[error("node {node} is missing required user input {input_name}")]
    MissingUserInput {
        /// The node declaring the unsatisfied input.
        node: NodeId,
        /// The input's declared name.
        input_name: String,
    },

    /// The execution context's concurrency or timeout limits are not positive.
    #[error("execution context has invalid limits: {0}")]
    InvalidLimits(String),
}

impl ExecutionError {
    /// A short, stable machine-readable code for this error variant.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidWorkflowTransition { .. } => "EXECUTION_INVALID_WORKFLOW_TRANSITION",
            Self::InvalidNodeTransition { .. } => "EXECUTION_INVALID_NODE_TRANSITION",
            Self::NodeNotFound(_) => "EXECUTION_NODE_NOT_FOUND",
            Self::PlanValidation(_) => "EXECUTION_PLAN_VALIDATION",
            Self::Serialization(_) => "EXECUTION_SERIALIZATION",
            Self::Cancelled => "EXECUTION_CANCELLED",
            Self::MissingUserInput { .. } => "EXECUTION_MISSING_USER_INPUT",
            Self::InvalidLimits(_) => "EXECUTION_INVALID_LIMITS",
        }
    }

    /// Whether the same operation might succeed if retried unchanged.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        false
    }
}

/// Per-node error taxonomy (§8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeErrorKind {
    /// The node's inputs failed validation before dispatch.
    ValidationError,
    /// A dependency the node required did not resolve.
    DependencyError,
    /// The program runner reported a non-success result.
    ExecutionError,
    /// The node exceeded its configured timeout.
    TimeoutError,
    /// The program runner rejected the request on resource grounds.
    ResourceError,
    /// An unexpected failure occurred outside the program's own control.
    SystemError,
}

/// A structured error recorded on a failed node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDescriptor {
    /// The taxonomy bucket this error falls into.
    pub kind: NodeErrorKind,
    /// Human-readable detail.
    pub message: String,
    /// The program runner's exit code, if one was reported.
    pub exit_code: Option<i32>,
    /// Whether the facade should permit `RetryNode` for this failure.
    pub retryable: bool,
}

impl ErrorDescriptor {
    /// Build a descriptor for a runner failure (`success == false`).
    ///
    /// `exit_code` is preserved for diagnostics only — a runner result with
    /// `success = false` is always a failure, independent of `exit_code`.
    #[must_use]
    pub fn execution_error(message: impl Into<String>, exit_code: Option<i32>) -> Self {
        Self {
            kind: NodeErrorKind::ExecutionError,
            message: message.into(),
            exit_code,
            retryable: true,
        }
    }

    /// Build a descriptor for a node that exceeded its timeout.
    #[must_use]
    pub fn timeout_error(message: impl Into<String>) -> Self {
        Self {
            kind: NodeErrorKind::TimeoutError,
            message: message.into(),
            exit_code: None,
            retryable: true,
        }
    }

    /// Build a descriptor for an unexpected internal failure.
    #[must_use]
    pub fn system_error(message: impl Into<String>) -> Self {
        Self {
            kind: NodeErrorKind::SystemError,
            message: message.into(),
            exit_code: None,
            retryable: true,
        }
    }

    /// Build a descriptor for an unsatisfied dependency.
    #[must_use]
    pub fn dependency_error(message: impl Into<String>) -> Self {
        Self {
            kind: NodeErrorKind::DependencyError,
            message: message.into(),
            exit_code: None,
            retryable: false,
        }
    }

    /// Build a descriptor for an input validation failure.
    #[must_use]
    pub fn validation_error(message: impl Into<String>) -> Self {
        Self {
            kind: NodeErrorKind::ValidationError,
            message: message.into(),
            exit_code: None,
            retryable: false,
        }
    }
}

/// Per-workflow error taxonomy (§8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowErrorKind {
    /// The workflow definition or execution context failed validation.
    ValidationError,
    /// The executor principal lacked permission to run the workflow.
    PermissionError,
    /// One or more nodes failed (aggregate of node-level `ExecutionError`s).
    ExecutionError,
    /// An unexpected failure occurred outside node execution.
    SystemError,
}

/// A structured error recorded on a failed workflow execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowErrorDescriptor {
    /// The taxonomy bucket this error falls into.
    pub kind: WorkflowErrorKind,
    /// Human-readable detail.
    pub message: String,
    /// Whether `Resume`/retry-style recovery is meaningful for this failure.
    pub can_retry: bool,
}

impl WorkflowErrorDescriptor {
    /// Build the aggregate error for one or more failed nodes.
    #[must_use]
    pub fn failed_nodes(count: usize) -> Self {
        Self {
            kind: WorkflowErrorKind::ExecutionError,
            message: format!("Workflow failed due to {count} failed nodes"),
            can_retry: false,
        }
    }

    /// Build the error for an unexpected internal failure.
    #[must_use]
    pub fn system_error(message: impl Into<String>) -> Self {
        Self {
            kind: WorkflowErrorKind::SystemError,
            message: message.into(),
            can_retry: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_workflow_transition_display() {
        let err = ExecutionError::InvalidWorkflowTransition {
            from: WorkflowStatus::Running,
            to: WorkflowStatus::Pending,
        };
        assert_eq!(
            err.to_string(),
            "invalid workflow transition from running to pending"
        );
        assert_eq!(err.error_code(), "EXECUTION_INVALID_WORKFLOW_TRANSITION");
        assert!(!err.is_retryable());
    }

    #[test]
    fn node_not_found_display() {
        let id = NodeId::v4();
        let err = ExecutionError::NodeNotFound(id);
        assert!(err.to_string().contains("node not found"));
    }

    #[test]
    fn execution_error_ignores_exit_code() {
        let descriptor = ErrorDescriptor::execution_error("non-zero exit", Some(0));
        assert_eq!(descriptor.kind, NodeErrorKind::ExecutionError);
        assert_eq!(descriptor.exit_code, Some(0));
        assert!(descriptor.retryable);
    }

    #[test]
    fn failed_nodes_message_reports_the_count() {
        let descriptor = WorkflowErrorDescriptor::failed_nodes(1);
        assert_eq!(descriptor.message, "Workflow failed due to 1 failed nodes");
    }

    #[test]
    fn from_serde_error() {
        let serde_err = serde_json::from_str::<String>("not valid json").unwrap_err();
        let err = ExecutionError::from(serde_err);
        assert_eq!(err.error_code(), "EXECUTION_SERIALIZATION");
    }
}
