//! Persisted execution state for workflows and their nodes (§3).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use flux_core::{Document, ExecutionId, NodeId, WorkflowId};
use serde::{Deserialize, Serialize};

use crate::context::ExecutionContext;
use crate::error::{ErrorDescriptor, ExecutionError, WorkflowErrorDescriptor};
use crate::node_status::NodeStatus;
use crate::progress::Progress;
use crate::results::Results;
use crate::status::WorkflowStatus;
use crate::transition::{validate_node_transition, validate_workflow_transition};

/// The execution record of a single node within a running workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeExecution {
    /// The node this record tracks.
    pub node_id: NodeId,
    /// Current status of the node.
    pub status: NodeStatus,
    /// Retry attempts made so far.
    #[serde(default)]
    pub retry_count: u32,
    /// Maximum retries permitted, from the node's `ExecutionSettings`.
    pub max_retries: u32,
    /// When this node started running.
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    /// When this node reached a terminal status.
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
    /// The input document resolved for this node.
    #[serde(default)]
    pub input_document: Document,
    /// The output document produced by this node, if any.
    #[serde(default)]
    pub output_document: Document,
    /// The structured error recorded for a failed node.
    #[serde(default)]
    pub error: Option<ErrorDescriptor>,
    /// The program-runner execution this node's run maps to, if dispatched.
    #[serde(default)]
    pub runner_execution_id: Option<ExecutionId>,
    /// Why this node was skipped, if it was.
    #[serde(default)]
    pub skip_reason: Option<String>,
}

impl NodeExecution {
    /// Create a new node execution record in the Pending status.
    #[must_use]
    pub fn new(node_id: NodeId, max_retries: u32) -> Self {
        Self {
            node_id,
            status: NodeStatus::Pending,
            retry_count: 0,
            max_retries,
            started_at: None,
            finished_at: None,
            input_document: Document::Null,
            output_document: Document::Null,
            error: None,
            runner_execution_id: None,
            skip_reason: None,
        }
    }

    /// Whether another retry attempt is permitted.
    #[must_use]
    pub fn can_retry(&self) -> bool {
        self.status == NodeStatus::Failed
            && self.retry_count < self.max_retries
            && self.error.as_ref().is_some_and(|e| e.retryable)
    }

    /// Transition to a new status, validating the transition and stamping
    /// timestamps.
    pub fn transition_to(&mut self, new_status: NodeStatus) -> Result<(), ExecutionError> {
        validate_node_transition(self.status, new_status)?;

        if new_status == NodeStatus::Running && self.started_at.is_none() {
            self.started_at = Some(Utc::now());
        }
        if new_status == NodeStatus::Retrying {
            self.retry_count += 1;
        }
        if new_status.is_terminal() {
            self.finished_at = Some(Utc::now());
        }

        self.status = new_status;
        Ok(())
    }
}

/// The durable record of one workflow run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowExecution {
    /// Unique identifier for this execution.
    pub execution_id: ExecutionId,
    /// The workflow being executed.
    pub workflow_id: WorkflowId,
    /// The principal on whose behalf this execution runs.
    pub executor: flux_core::UserId,
    /// Current execution status.
    pub status: WorkflowStatus,
    /// The context this execution was started with.
    pub context: ExecutionContext,
    /// Per-node execution records.
    pub node_executions: HashMap<NodeId, NodeExecution>,
    /// Rolling progress summary.
    pub progress: Progress,
    /// Append-only log of execution events.
    #[serde(default)]
    pub logs: Vec<String>,
    /// The workflow-level error, populated when `status == Failed`.
    #[serde(default)]
    pub error: Option<WorkflowErrorDescriptor>,
    /// The results record, populated on completion.
    #[serde(default)]
    pub results: Option<Results>,
    /// When the execution was created.
    pub created_at: DateTime<Utc>,
    /// When the execution started running.
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    /// When the execution reached a terminal status.
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
}

impl WorkflowExecution {
    /// Create a new workflow execution in the Pending status, with one
    /// `NodeExecution` per node.
    #[must_use]
    pub fn new(
        execution_id: ExecutionId,
        workflow_id: WorkflowId,
        executor: flux_core::UserId,
        context: ExecutionContext,
        node_defaults: &[(NodeId, u32)],
    ) -> Self {
        let node_executions = node_defaults
            .iter()
            .map(|&(id, max_retries)| (id, NodeExecution::new(id, max_retries)))
            .collect::<HashMap<_, _>>();
        let total = node_executions.len();

        Self {
            execution_id,
            workflow_id,
            executor,
            status: WorkflowStatus::Pending,
            context,
            node_executions,
            progress: Progress::new(total, 0, 0, 0),
            logs: Vec::new(),
            error: None,
            results: None,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }

    /// Fetch a node's execution record.
    #[must_use]
    pub fn node(&self, node_id: NodeId) -> Option<&NodeExecution> {
        self.node_executions.get(&node_id)
    }

    /// Recompute `progress` from the current node statuses.
    pub fn recompute_progress(&mut self) {
        let total = self.node_executions.len();
        let completed = self
            .node_executions
            .values()
            .filter(|ne| ne.status == NodeStatus::Completed || ne.status == NodeStatus::Skipped)
            .count();
        let failed = self
            .node_executions
            .values()
            .filter(|ne| ne.status == NodeStatus::Failed)
            .count();
        let running = self
            .node_executions
            .values()
            .filter(|ne| ne.status.is_active())
            .count();
        self.progress = Progress::new(total, completed, failed, running);
    }

    /// Returns `true` if every node has reached a terminal status.
    #[must_use]
    pub fn all_nodes_terminal(&self) -> bool {
        self.node_executions
            .values()
            .all(|ne| ne.status.is_terminal())
    }

    /// Append a log line to the execution's log stream.
    pub fn log(&mut self, line: impl Into<String>) {
        self.logs.push(line.into());
    }

    /// Transition the execution's workflow-level status, validating the
    /// transition and stamping timestamps.
    pub fn transition_to(&mut self, new_status: WorkflowStatus) -> Result<(), ExecutionError> {
        validate_workflow_transition(self.status, new_status)?;

        if new_status == WorkflowStatus::Running && self.started_at.is_none() {
            self.started_at = Some(Utc::now());
        }
        if new_status.is_terminal() {
            self.finished_at = Some(Utc::now());
        }

        self.status = new_status;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_execution() -> (WorkflowExecution, NodeId, NodeId) {
        let n1 = NodeId::v4();
        let n2 = NodeId::v4();
        let execution = WorkflowExecution::new(
            ExecutionId::v4(),
            WorkflowId::v4(),
            flux_core::UserId::v4(),
            ExecutionContext::default(),
            &[(n1, 0), (n2, 2)],
        );
        (execution, n1, n2)
    }

    #[test]
    fn new_execution_state() {
        let (execution, n1, _n2) = make_execution();
        assert_eq!(execution.status, WorkflowStatus::Pending);
        assert_eq!(execution.node_executions.len(), 2);
        assert_eq!(execution.node(n1).unwrap().status, NodeStatus::Pending);
        assert_eq!(execution.progress.total, 2);
    }

    #[test]
    fn node_execution_transitions_and_stamps_timestamps() {
        let mut ne = NodeExecution::new(NodeId::v4(), 1);
        assert!(ne.transition_to(NodeStatus::Running).is_ok());
        assert!(ne.started_at.is_some());
        assert!(ne.transition_to(NodeStatus::Completed).is_ok());
        assert!(ne.finished_at.is_some());
    }

    #[test]
    fn node_execution_invalid_transition() {
        let mut ne = NodeExecution::new(NodeId::v4(), 1);
        let err = ne.transition_to(NodeStatus::Completed).unwrap_err();
        assert!(matches!(err, ExecutionError::InvalidNodeTransition { .. }));
    }

    #[test]
    fn retry_count_increments_on_retrying() {
        let mut ne = NodeExecution::new(NodeId::v4(), 2);
        ne.transition_to(NodeStatus::Running).unwrap();
        ne.error = Some(ErrorDescriptor::execution_error("boom", Some(1)));
        ne.transition_to(NodeStatus::Failed).unwrap();
        assert!(ne.can_retry());
        ne.transition_to(NodeStatus::Retrying).unwrap();
        assert_eq!(ne.retry_count, 1);
    }

    #[test]
    fn can_retry_respects_max_retries_and_retryable_flag() {
        let mut ne = NodeExecution::new(NodeId::v4(), 0);
        ne.transition_to(NodeStatus::Running).unwrap();
        ne.error = Some(ErrorDescriptor::execution_error("boom", Some(1)));
        ne.transition_to(NodeStatus::Failed).unwrap();
        assert!(!ne.can_retry());

        let mut ne2 = NodeExecution::new(NodeId::v4(), 3);
        ne2.transition_to(NodeStatus::Running).unwrap();
        ne2.error = Some(ErrorDescriptor::dependency_error("missing input"));
        ne2.transition_to(NodeStatus::Failed).unwrap();
        assert!(!ne2.can_retry());
    }

    #[test]
    fn recompute_progress_counts_statuses() {
        let (mut execution, n1, n2) = make_execution();
        execution
            .node_executions
            .get_mut(&n1)
            .unwrap()
            .transition_to(NodeStatus::Running)
            .unwrap();
        execution
            .node_executions
            .get_mut(&n1)
            .unwrap()
            .transition_to(NodeStatus::Completed)
            .unwrap();
        execution
            .node_executions
            .get_mut(&n2)
            .unwrap()
            .transition_to(NodeStatus::Running)
            .unwrap();
        execution.recompute_progress();

        assert_eq!(execution.progress.completed, 1);
        assert_eq!(execution.progress.running, 1);
        assert!(!execution.all_nodes_terminal());
    }

    #[test]
    fn workflow_transition_valid() {
        let (mut execution, _n1, _n2) = make_execution();
        assert!(execution.transition_to(WorkflowStatus::Running).is_ok());
        assert_eq!(execution.status, WorkflowStatus::Running);
        assert!(execution.started_at.is_some());
    }

    #[test]
    fn workflow_transition_invalid() {
        let (mut execution, _n1, _n2) = make_execution();
        let err = execution.transition_to(WorkflowStatus::Completed).unwrap_err();
        assert!(matches!(err, ExecutionError::InvalidWorkflowTransition { .. }));
    }

    #[test]
    fn workflow_transition_terminal_sets_finished_at() {
        let (mut execution, _n1, _n2) = make_execution();
        execution.transition_to(WorkflowStatus::Running).unwrap();
        execution.transition_to(WorkflowStatus::Completed).unwrap();
        assert!(execution.finished_at.is_some());
    }

    #[test]
    fn log_appends_lines() {
        let (mut execution, _n1, _n2) = make_execution();
        execution.log("started");
        assert_eq!(execution.logs, vec!["started".to_string()]);
    }

    #[test]
    fn serde_roundtrip() {
        let (execution, _n1, _n2) = make_execution();
        let json = serde_json::to_string(&execution).unwrap();
        let back: WorkflowExecution = serde_json::from_str(&json).unwrap();
        assert_eq!(back.execution_id, execution.execution_id);
        assert_eq!(back.workflow_id, execution.workflow_id);
        assert_eq!(back.status, execution.status);
        assert_eq!(back.node_executions.len(), execution.node_executions.len());
    }
}
