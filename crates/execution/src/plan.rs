//! Execution planning — derives a parallel execution schedule from a workflow.

use chrono::{DateTime, Utc};
use flux_core::{ExecutionId, NodeId, WorkflowId};
use flux_workflow::{DependencyGraph, Workflow};
use serde::{Deserialize, Serialize};

use crate::error::ExecutionError;

/// A pre-computed execution plan derived from a workflow definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionPlan {
    /// Execution this plan belongs to.
    pub execution_id: ExecutionId,
    /// Workflow this plan was derived from.
    pub workflow_id: WorkflowId,
    /// Parallel execution groups; each group's nodes have no dependency
    /// between them and can run concurrently.
    pub parallel_groups: Vec<Vec<NodeId>>,
    /// Nodes with no enabled predecessors (start points).
    pub entry_nodes: Vec<NodeId>,
    /// Nodes with no enabled successors (end points).
    pub exit_nodes: Vec<NodeId>,
    /// Total number of nodes in the plan.
    pub total_nodes: usize,
    /// When this plan was created.
    pub created_at: DateTime<Utc>,
}

impl ExecutionPlan {
    /// Build an execution plan from a workflow definition.
    ///
    /// Fails if the workflow has no nodes, or if its graph does not form a
    /// DAG over enabled nodes and edges.
    pub fn from_workflow(execution_id: ExecutionId, workflow: &Workflow) -> Result<Self, ExecutionError> {
        if workflow.nodes.is_empty() {
            return Err(ExecutionError::PlanValidation("workflow has no nodes".into()));
        }

        let graph = DependencyGraph::from_definition(workflow)
            .map_err(|e| ExecutionError::PlanValidation(format!("graph construction failed: {e}")))?;

        let parallel_groups = graph
            .compute_levels()
            .map_err(|e| ExecutionError::PlanValidation(format!("level computation failed: {e}")))?;

        Ok(Self {
            execution_id,
            workflow_id: workflow.id,
            entry_nodes: graph.entry_nodes(),
            exit_nodes: graph.exit_nodes(),
            total_nodes: graph.node_count(),
            parallel_groups,
            created_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flux_workflow::{Edge, Node, WorkflowConfig};
    use std::collections::HashMap;

    fn make_workflow(nodes: Vec<Node>, edges: Vec<Edge>) -> Workflow {
        let now = Utc::now();
        Workflow {
            id: WorkflowId::v4(),
            name: "test".into(),
            description: None,
            version: flux_core::Version::new(0, 1, 0),
            nodes,
            edges,
            variables: HashMap::new(),
            config: WorkflowConfig::default(),
            tags: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    fn node(id: NodeId) -> Node {
        Node::new(id, "n", flux_core::ProgramId::v4())
    }

    #[test]
    fn plan_from_linear_workflow() {
        let a = NodeId::v4();
        let b = NodeId::v4();
        let c = NodeId::v4();
        let wf = make_workflow(
            vec![node(a), node(b), node(c)],
            vec![Edge::new(a, b), Edge::new(b, c)],
        );
        let plan = ExecutionPlan::from_workflow(ExecutionId::v4(), &wf).unwrap();

        assert_eq!(plan.total_nodes, 3);
        assert_eq!(plan.parallel_groups.len(), 3);
        assert_eq!(plan.entry_nodes, vec![a]);
        assert_eq!(plan.exit_nodes, vec![c]);
    }

    #[test]
    fn plan_from_diamond_workflow() {
        let a = NodeId::v4();
        let b = NodeId::v4();
        let c = NodeId::v4();
        let d = NodeId::v4();
        let wf = make_workflow(
            vec![node(a), node(b), node(c), node(d)],
            vec![
                Edge::new(a, b),
                Edge::new(a, c),
                Edge::new(b, d),
                Edge::new(c, d),
            ],
        );
        let plan = ExecutionPlan::from_workflow(ExecutionId::v4(), &wf).unwrap();

        assert_eq!(plan.total_nodes, 4);
        assert_eq!(plan.parallel_groups.len(), 3);
        assert_eq!(plan.parallel_groups[1].len(), 2);
    }

    #[test]
    fn plan_rejects_empty_workflow() {
        let wf = make_workflow(vec![], vec![]);
        let err = ExecutionPlan::from_workflow(ExecutionId::v4(), &wf).unwrap_err();
        assert!(err.to_string().contains("no nodes"));
    }

    #[test]
    fn plan_rejects_cyclic_workflow() {
        let a = NodeId::v4();
        let b = NodeId::v4();
        let wf = make_workflow(vec![node(a), node(b)], vec![Edge::new(a, b), Edge::new(b, a)]);
        let err = ExecutionPlan::from_workflow(ExecutionId::v4(), &wf).unwrap_err();
        assert!(err.to_string().contains("level computation failed"));
    }

    #[test]
    fn plan_preserves_ids() {
        let exec_id = ExecutionId::v4();
        let a = NodeId::v4();
        let wf = make_workflow(vec![node(a)], vec![]);
        let plan = ExecutionPlan::from_workflow(exec_id, &wf).unwrap();

        assert_eq!(plan.execution_id, exec_id);
        assert_eq!(plan.workflow_id, wf.id);
    }

    #[test]
    fn plan_single_node() {
        let a = NodeId::v4();
        let wf = make_workflow(vec![node(a)], vec![]);
        let plan = ExecutionPlan::from_workflow(ExecutionId::v4(), &wf).unwrap();

        assert_eq!(plan.total_nodes, 1);
        assert_eq!(plan.parallel_groups.len(), 1);
        assert_eq!(plan.entry_nodes, vec![a]);
        assert_eq!(plan.exit_nodes, vec![a]);
    }

    #[test]
    fn plan_serde_roundtrip() {
        let a = NodeId::v4();
        let b = NodeId::v4();
        let wf = make_workflow(vec![node(a), node(b)], vec![Edge::new(a, b)]);
        let plan = ExecutionPlan::from_workflow(ExecutionId::v4(), &wf).unwrap();

        let json = serde_json::to_string(&plan).unwrap();
        let back: ExecutionPlan = serde_json::from_str(&json).unwrap();
        assert_eq!(back.execution_id, plan.execution_id);
        assert_eq!(back.total_nodes, 2);
        assert_eq!(back.parallel_groups.len(), 2);
    }
}
