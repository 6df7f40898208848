//! Structural validation of a [`Workflow`](crate::Workflow) prior to execution.
//!
//! Mirrors the checks a workflow must pass before an execution can be
//! created: graph structure, dependency resolvability, node/edge sanity,
//! and a few complexity metrics surfaced to callers as informational
//! findings rather than hard errors.

use std::collections::HashSet;

use flux_core::NodeId;
use serde::{Deserialize, Serialize};

use crate::definition::Workflow;
use crate::error::WorkflowError;
use crate::graph::DependencyGraph;

/// A single validation finding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Finding {
    /// Stable machine-readable code, shared with [`WorkflowError::error_code`] where applicable.
    pub code: String,
    /// Human-readable detail.
    pub message: String,
    /// The node this finding concerns, if any.
    pub node: Option<NodeId>,
}

impl Finding {
    fn new(code: impl Into<String>, message: impl Into<String>, node: Option<NodeId>) -> Self {
        Self { code: code.into(), message: message.into(), node }
    }
}

/// A coarse complexity bucket derived from a workflow's size and branching.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplexityLevel {
    /// Small, mostly linear workflows.
    #[default]
    Simple,
    /// A handful of branches or a couple dozen nodes.
    Moderate,
    /// Wide fan-out/fan-in or a few dozen nodes.
    Complex,
    /// Large and heavily branched.
    VeryComplex,
}

impl ComplexityLevel {
    fn from_metrics(node_count: usize, cyclomatic_complexity: i64) -> Self {
        match (node_count, cyclomatic_complexity) {
            (n, c) if n <= 5 && c <= 3 => Self::Simple,
            (n, c) if n <= 15 && c <= 8 => Self::Moderate,
            (n, c) if n <= 40 && c <= 20 => Self::Complex,
            _ => Self::VeryComplex,
        }
    }
}

/// Size and shape metrics computed over the enabled graph.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct ComplexityMetrics {
    /// Enabled node count.
    pub node_count: usize,
    /// Active edge count.
    pub edge_count: usize,
    /// Number of parallel levels (longest path length in node hops).
    pub depth: usize,
    /// Size of the widest level.
    pub max_width: usize,
    /// Average out-degree (`edge_count / node_count`), 0 for an empty graph.
    pub connectivity_ratio: f64,
    /// `E - V + 2 + conditional-nodes`, with conditional nodes counted as
    /// those with more than one enabled outgoing edge.
    pub cyclomatic_complexity: i64,
    /// Bucketed reading of the two metrics above.
    pub complexity_level: ComplexityLevel,
}

/// The combined outcome of running every validation operation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ValidationResult {
    /// Findings that prevent execution.
    pub errors: Vec<Finding>,
    /// Findings that do not prevent execution but merit attention.
    pub warnings: Vec<Finding>,
    /// Purely informational findings (e.g. unreachable nodes that are also orphans).
    pub info: Vec<Finding>,
    /// Size and shape metrics, present whenever the graph could be built at all.
    pub metrics: Option<ComplexityMetrics>,
    /// A stable topological ordering, present whenever the graph is acyclic.
    pub topological_order: Option<Vec<NodeId>>,
}

impl ValidationResult {
    /// Whether the workflow may be used to start an execution.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Runs the full structural validation suite over a workflow.
#[derive(Debug, Default)]
pub struct Validator;

impl Validator {
    /// Construct a validator. Stateless; exists for symmetry with other
    /// engine components and to leave room for configurable validation rules.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Run every validation operation and merge the results.
    pub fn validate(&self, workflow: &Workflow) -> ValidationResult {
        let mut result = ValidationResult::default();

        self.validate_structure(workflow, &mut result);

        let graph = match DependencyGraph::from_definition(workflow) {
            Ok(graph) => graph,
            Err(err) => {
                result.errors.push(Finding::new(err.error_code(), err.to_string(), None));
                return result;
            }
        };

        self.validate_dependencies(workflow, &graph, &mut result);
        self.validate_nodes(workflow, &mut result);
        self.validate_edges(workflow, &mut result);

        if let Some(cycle_node) = graph.find_cycle() {
            result.errors.push(Finding::new(
                WorkflowError::CycleDetected(cycle_node).error_code(),
                format!("cycle detected at node {cycle_node}"),
                Some(cycle_node),
            ));
        } else {
            result.topological_order = graph.topological_order().ok();
        }

        for orphan in graph.orphan_nodes() {
            result.info.push(Finding::new(
                "WORKFLOW_ORPHAN_NODE",
                "node has no incoming or outgoing edges",
                Some(orphan),
            ));
        }

        for unreachable in graph.unreachable_nodes() {
            result.info.push(Finding::new(
                "WORKFLOW_UNREACHABLE_NODE",
                "node is not reachable from any start node",
                Some(unreachable),
            ));
        }

        if graph.node_count() > 0 {
            if graph.entry_nodes().is_empty() {
                result.errors.push(Finding::new(
                    "WORKFLOW_NO_START_NODES",
                    "workflow has no start nodes: every enabled node has an incoming edge",
                    None,
                ));
            }
            if graph.exit_nodes().is_empty() {
                result.warnings.push(Finding::new(
                    "WORKFLOW_NO_END_NODES",
                    "workflow has no end nodes: every enabled node has an outgoing edge",
                    None,
                ));
            }
        }

        if let Ok(levels) = graph.compute_levels() {
            let max_width = levels.iter().map(Vec::len).max().unwrap_or(0);
            let node_count = graph.node_count();
            let edge_count = workflow.active_edges().count();
            let connectivity_ratio = if node_count == 0 {
                0.0
            } else {
                edge_count as f64 / node_count as f64
            };
            let cyclomatic_complexity =
                edge_count as i64 - node_count as i64 + 2 + graph.branch_node_count() as i64;
            result.metrics = Some(ComplexityMetrics {
                node_count,
                edge_count,
                depth: levels.len(),
                max_width,
                connectivity_ratio,
                cyclomatic_complexity,
                complexity_level: ComplexityLevel::from_metrics(node_count, cyclomatic_complexity),
            });
        }

        result
    }

    /// At least one enabled node exists.
    fn validate_structure(&self, workflow: &Workflow, result: &mut ValidationResult) {
        if workflow.enabled_nodes().next().is_none() {
            result.errors.push(Finding::new(
                WorkflowError::EmptyWorkflow.error_code(),
                "workflow has no enabled nodes",
                None,
            ));
        }
    }

    /// Every input mapping's source node exists and every required input is satisfiable.
    fn validate_dependencies(
        &self,
        workflow: &Workflow,
        graph: &DependencyGraph,
        result: &mut ValidationResult,
    ) {
        let node_ids: HashSet<NodeId> = workflow.enabled_nodes().map(|n| n.id).collect();

        for node in workflow.enabled_nodes() {
            for mapping in &node.inputs.input_mappings {
                if !node_ids.contains(&mapping.source_node_id) {
                    result.errors.push(Finding::new(
                        "WORKFLOW_UNKNOWN_MAPPING_SOURCE",
                        format!(
                            "node {} input mapping references unknown source node {}",
                            node.id, mapping.source_node_id
                        ),
                        Some(node.id),
                    ));
                }
            }

            for declared in &node.inputs.user_inputs {
                if !declared.required || declared.default.is_some() {
                    continue;
                }
                let satisfied_by_mapping = node.inputs.input_mappings.iter().any(|m| {
                    m.input_name == declared.name && (m.is_optional || m.default_value.is_some())
                        || (m.input_name == declared.name && !m.is_optional)
                });
                let satisfied_static = node.inputs.static_inputs.contains_key(&declared.name);
                if !satisfied_by_mapping && !satisfied_static {
                    result.warnings.push(Finding::new(
                        "WORKFLOW_MISSING_REQUIRED_INPUT",
                        format!(
                            "node {} required input {} has no static value, default, or mapping",
                            node.id, declared.name
                        ),
                        Some(node.id),
                    ));
                }
            }
        }

        let _ = graph;
    }

    /// Node-local sanity: non-empty names, sane settings.
    fn validate_nodes(&self, workflow: &Workflow, result: &mut ValidationResult) {
        for node in workflow.enabled_nodes() {
            if node.name.trim().is_empty() {
                result.warnings.push(Finding::new(
                    "WORKFLOW_BLANK_NODE_NAME",
                    "node has an empty display name",
                    Some(node.id),
                ));
            }
            if node.settings.timeout_minutes == 0 {
                result.warnings.push(Finding::new(
                    "WORKFLOW_ZERO_TIMEOUT",
                    "node timeout is zero minutes",
                    Some(node.id),
                ));
            }
        }
    }

    /// Edge-local sanity: duplicate edges between the same pair.
    fn validate_edges(&self, workflow: &Workflow, result: &mut ValidationResult) {
        let mut seen = HashSet::new();
        for edge in workflow.active_edges() {
            if !seen.insert((edge.source, edge.target)) {
                result.warnings.push(Finding::new(
                    "WORKFLOW_DUPLICATE_EDGE",
                    format!("duplicate edge {} -> {}", edge.source, edge.target),
                    Some(edge.target),
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{Edge, Node, WorkflowConfig};
    use chrono::Utc;
    use flux_core::{ProgramId, WorkflowId};
    use rstest::rstest;
    use std::collections::HashMap;

    fn workflow(nodes: Vec<Node>, edges: Vec<Edge>) -> Workflow {
        let now = Utc::now();
        Workflow {
            id: WorkflowId::v4(),
            name: "t".into(),
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

    #[test]
    fn empty_workflow_is_invalid() {
        let wf = workflow(vec![], vec![]);
        let result = Validator::new().validate(&wf);
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|f| f.code == "WORKFLOW_EMPTY"));
    }

    #[test]
    fn acyclic_workflow_is_valid_with_metrics() {
        let (a, b) = (NodeId::v4(), NodeId::v4());
        let wf = workflow(
            vec![
                Node::new(a, "a", ProgramId::v4()),
                Node::new(b, "b", ProgramId::v4()),
            ],
            vec![Edge::new(a, b)],
        );
        let result = Validator::new().validate(&wf);
        assert!(result.is_valid());
        let metrics = result.metrics.unwrap();
        assert_eq!(metrics.node_count, 2);
        assert_eq!(metrics.depth, 2);
        assert_eq!(metrics.connectivity_ratio, 0.5);
        assert_eq!(metrics.cyclomatic_complexity, 1);
        assert_eq!(metrics.complexity_level, ComplexityLevel::Simple);
        assert_eq!(result.topological_order, Some(vec![a, b]));
    }

    #[test]
    fn cyclic_workflow_reports_cycle_error() {
        let (a, b) = (NodeId::v4(), NodeId::v4());
        let wf = workflow(
            vec![
                Node::new(a, "a", ProgramId::v4()),
                Node::new(b, "b", ProgramId::v4()),
            ],
            vec![Edge::new(a, b), Edge::new(b, a)],
        );
        let result = Validator::new().validate(&wf);
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|f| f.code == "WORKFLOW_CYCLE_DETECTED"));
    }

    #[rstest]
    #[case(0, true)]
    #[case(30, false)]
    fn zero_timeout_warns(#[case] timeout: u32, #[case] expect_warning: bool) {
        let a = NodeId::v4();
        let mut node = Node::new(a, "a", ProgramId::v4());
        node.settings.timeout_minutes = timeout;
        let wf = workflow(vec![node], vec![]);
        let result = Validator::new().validate(&wf);
        assert_eq!(
            result.warnings.iter().any(|f| f.code == "WORKFLOW_ZERO_TIMEOUT"),
            expect_warning
        );
    }

    #[test]
    fn orphan_node_reports_info_finding() {
        let a = NodeId::v4();
        let wf = workflow(vec![Node::new(a, "a", ProgramId::v4())], vec![]);
        let result = Validator::new().validate(&wf);
        assert!(result.is_valid());
        assert!(result.info.iter().any(|f| f.code == "WORKFLOW_ORPHAN_NODE"));
    }

    #[test]
    fn unreachable_node_reports_info_finding() {
        let (a, b, c, d) = (NodeId::v4(), NodeId::v4(), NodeId::v4(), NodeId::v4());
        // a -> b is the only reachable component; c <-> d form a separate
        // cycle with no incoming edge from outside, so neither is an entry
        // node and both are unreachable from one.
        let wf = workflow(
            vec![
                Node::new(a, "a", ProgramId::v4()),
                Node::new(b, "b", ProgramId::v4()),
                Node::new(c, "c", ProgramId::v4()),
                Node::new(d, "d", ProgramId::v4()),
            ],
            vec![Edge::new(a, b), Edge::new(c, d), Edge::new(d, c)],
        );
        let result = Validator::new().validate(&wf);
        assert!(result.info.iter().any(|f| f.code == "WORKFLOW_UNREACHABLE_NODE" && f.node == Some(c)));
        assert!(result.info.iter().any(|f| f.code == "WORKFLOW_UNREACHABLE_NODE" && f.node == Some(d)));
    }

    #[test]
    fn cyclic_workflow_has_no_start_nodes() {
        let (a, b) = (NodeId::v4(), NodeId::v4());
        let wf = workflow(
            vec![
                Node::new(a, "a", ProgramId::v4()),
                Node::new(b, "b", ProgramId::v4()),
            ],
            vec![Edge::new(a, b), Edge::new(b, a)],
        );
        let result = Validator::new().validate(&wf);
        assert!(result.errors.iter().any(|f| f.code == "WORKFLOW_NO_START_NODES"));
    }

    #[test]
    fn cyclic_workflow_has_no_end_nodes() {
        let (a, b) = (NodeId::v4(), NodeId::v4());
        let wf = workflow(
            vec![
                Node::new(a, "a", ProgramId::v4()),
                Node::new(b, "b", ProgramId::v4()),
            ],
            vec![Edge::new(a, b), Edge::new(b, a)],
        );
        let result = Validator::new().validate(&wf);
        assert!(result.warnings.iter().any(|f| f.code == "WORKFLOW_NO_END_NODES"));
    }

    #[test]
    fn normal_workflow_has_start_and_end_nodes() {
        let (a, b) = (NodeId::v4(), NodeId::v4());
        let wf = workflow(
            vec![
                Node::new(a, "a", ProgramId::v4()),
                Node::new(b, "b", ProgramId::v4()),
            ],
            vec![Edge::new(a, b)],
        );
        let result = Validator::new().validate(&wf);
        assert!(!result.errors.iter().any(|f| f.code == "WORKFLOW_NO_START_NODES"));
        assert!(!result.warnings.iter().any(|f| f.code == "WORKFLOW_NO_END_NODES"));
    }
}
