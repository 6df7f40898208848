//! The workflow data model: `Workflow`, `Node`, and `Edge`.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use flux_core::{Document, NodeId, ProgramId, ProgramVersionId, WorkflowId};
use serde::{Deserialize, Serialize};

/// A single declared user input a node's program requires.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserInputDeclaration {
    /// The input's name, addressed by callers as `"{node_id}.{name}"`.
    pub name: String,
    /// Whether the workflow can run without this input being supplied.
    pub required: bool,
    /// Default value used when the caller supplies none and it is optional.
    pub default: Option<Document>,
}

/// A legacy mapping from a predecessor's named output to an input field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InputMapping {
    /// The predecessor node this mapping reads from.
    pub source_node_id: NodeId,
    /// The named output field on the predecessor.
    pub source_output_name: String,
    /// The input field name to assign on this node.
    pub input_name: String,
    /// An optional stringly-typed transformation expression.
    pub transformation: Option<String>,
    /// Value used when the source output is absent and `is_optional` is true.
    pub default_value: Option<Document>,
    /// When `false`, an unsatisfied mapping is logged but never fails the node.
    pub is_optional: bool,
}

/// Static, constant input values attached directly to a node.
pub type StaticInputs = HashMap<String, Document>;

/// A node's input configuration: static inputs, declared user inputs, and
/// legacy input mappings (§4.3).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct InputConfiguration {
    /// Constant values supplied with the node definition.
    pub static_inputs: StaticInputs,
    /// Inputs the program declares it needs from the caller.
    pub user_inputs: Vec<UserInputDeclaration>,
    /// Legacy per-field mappings from predecessor outputs.
    pub input_mappings: Vec<InputMapping>,
}

/// One output field mapping: where it comes from, what it is called downstream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OutputMapping {
    /// The name under which the value is exposed to successors.
    pub output_name: String,
    /// The runner field to read (a well-known field or an output-document key).
    pub source_field: String,
    /// An optional stringly-typed transformation expression.
    pub transformation: Option<String>,
}

/// A node's output configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct OutputConfiguration {
    /// Field mappings applied to the runner's result.
    pub output_mappings: Vec<OutputMapping>,
}

/// Per-node execution tuning: timeouts, retries, environment, resource caps.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExecutionSettings {
    /// Wall-clock timeout, in minutes.
    pub timeout_minutes: u32,
    /// How many times a failed node may be retried via the facade.
    pub max_retries: u32,
    /// Environment variable overrides merged into the runner request.
    pub environment_overrides: HashMap<String, String>,
    /// Maximum CPU percentage.
    pub max_cpu_percentage: u32,
    /// Maximum resident memory, in megabytes.
    pub max_memory_mb: u64,
    /// Maximum scratch disk usage, in megabytes.
    pub max_disk_mb: u64,
    /// The program's declared UI surface; non-interactive unless this is
    /// outside {"console","none","cli","batch","service"} and `ui_schema`
    /// is set.
    #[serde(default = "default_ui_type")]
    pub ui_type: String,
    /// The generated input schema for an interactive program's UI component.
    /// `None` means no UI component is registered, which makes the node
    /// non-interactive regardless of `ui_type`.
    #[serde(default)]
    pub ui_schema: Option<Document>,
}

fn default_ui_type() -> String {
    "none".to_string()
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self {
            timeout_minutes: 30,
            max_retries: 0,
            environment_overrides: HashMap::new(),
            max_cpu_percentage: 100,
            max_memory_mb: 512,
            max_disk_mb: 1024,
            ui_type: default_ui_type(),
            ui_schema: None,
        }
    }
}

/// A single program invocation within a workflow.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Node {
    /// Identity, unique within the owning workflow.
    pub id: NodeId,
    /// Human-readable display name; also the seed for the canonical program name.
    pub name: String,
    /// The program this node invokes.
    pub program_id: ProgramId,
    /// An optional specific program version.
    pub version_id: Option<ProgramVersionId>,
    /// Input wiring.
    pub inputs: InputConfiguration,
    /// Output wiring.
    pub outputs: OutputConfiguration,
    /// Execution tuning.
    pub settings: ExecutionSettings,
    /// When `true`, the node is excluded from scheduling and validation.
    pub disabled: bool,
}

impl Node {
    /// Build a node with default settings and empty input/output configuration.
    #[must_use]
    pub fn new(id: NodeId, name: impl Into<String>, program_id: ProgramId) -> Self {
        Self {
            id,
            name: name.into(),
            program_id,
            version_id: None,
            inputs: InputConfiguration::default(),
            outputs: OutputConfiguration::default(),
            settings: ExecutionSettings::default(),
            disabled: false,
        }
    }
}

/// The kind of dependency an edge represents.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// An ordinary data/control dependency; observed by the scheduler.
    Normal,
    /// A loop-back edge observed only by complexity metrics, never by the scheduler.
    Loop,
}

/// A directed dependency between two nodes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Edge {
    /// The upstream node.
    pub source: NodeId,
    /// The downstream node.
    pub target: NodeId,
    /// When `true`, the edge is excluded from scheduling and validation.
    pub disabled: bool,
    /// The edge's kind.
    pub kind: EdgeKind,
}

impl Edge {
    /// Build an enabled, normal edge from `source` to `target`.
    #[must_use]
    pub fn new(source: NodeId, target: NodeId) -> Self {
        Self {
            source,
            target,
            disabled: false,
            kind: EdgeKind::Normal,
        }
    }

    /// Whether this edge participates in scheduling and DAG validation.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.disabled && self.kind == EdgeKind::Normal
    }
}

/// Engine-level tuning that belongs to the workflow itself, not a single run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkflowConfig {
    /// Default per-execution node concurrency cap, used when a run's
    /// `ExecutionContext` does not override it.
    pub default_max_concurrent_nodes: usize,
    /// Whether node failures abort the workflow by default.
    pub continue_on_error_default: bool,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            default_max_concurrent_nodes: 10,
            continue_on_error_default: false,
        }
    }
}

/// A named DAG of program-invocation nodes.
///
/// Immutable for the duration of any execution built from it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Workflow {
    /// Identity.
    pub id: WorkflowId,
    /// Display name.
    pub name: String,
    /// Optional free-text description.
    pub description: Option<String>,
    /// Semantic version of this workflow definition.
    pub version: flux_core::Version,
    /// The node set.
    pub nodes: Vec<Node>,
    /// The edge set.
    pub edges: Vec<Edge>,
    /// Workflow-level variables, visible to the propagator as static context.
    pub variables: HashMap<String, Document>,
    /// Engine-level tuning.
    pub config: WorkflowConfig,
    /// Free-form labels.
    pub tags: Vec<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last-modified timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Workflow {
    /// Enabled nodes (`disabled == false`).
    pub fn enabled_nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(|n| !n.disabled)
    }

    /// Enabled, active edges (`!disabled && kind == Normal`).
    pub fn active_edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(|e| e.is_active())
    }

    /// Look up a node by id.
    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_workflow(nodes: Vec<Node>, edges: Vec<Edge>) -> Workflow {
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

    #[test]
    fn enabled_nodes_skips_disabled() {
        let mut n1 = Node::new(NodeId::v4(), "a", ProgramId::v4());
        let n2_id = NodeId::v4();
        let mut n2 = Node::new(n2_id, "b", ProgramId::v4());
        n2.disabled = true;
        n1.disabled = false;
        let wf = sample_workflow(vec![n1, n2], vec![]);
        assert_eq!(wf.enabled_nodes().count(), 1);
    }

    #[test]
    fn active_edges_skips_loop_and_disabled() {
        let a = NodeId::v4();
        let b = NodeId::v4();
        let mut loop_edge = Edge::new(b, a);
        loop_edge.kind = EdgeKind::Loop;
        let mut disabled_edge = Edge::new(a, b);
        disabled_edge.disabled = true;
        let normal = Edge::new(a, b);
        let wf = sample_workflow(vec![], vec![normal, loop_edge, disabled_edge]);
        assert_eq!(wf.active_edges().count(), 1);
    }

    #[test]
    fn node_lookup_by_id() {
        let id = NodeId::v4();
        let node = Node::new(id, "a", ProgramId::v4());
        let wf = sample_workflow(vec![node], vec![]);
        assert!(wf.node(id).is_some());
        assert!(wf.node(NodeId::v4()).is_none());
    }
}
