//! The dependency graph derived from a [`Workflow`](crate::Workflow).
//!
//! Built once per execution plan and reused for cycle detection, entry/exit
//! node discovery, and parallel-level computation. The scheduler itself does
//! not consult this graph's level ordering at dispatch time (§4.4 is
//! event-driven); `compute_levels` exists for planning and for the
//! human-facing topological display named in §4.1.

use std::collections::{HashMap, HashSet, VecDeque};

use flux_core::NodeId;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;

use crate::definition::Workflow;
use crate::error::WorkflowError;

/// A DAG over a workflow's enabled nodes and active edges.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    graph: DiGraph<NodeId, ()>,
    index_of: HashMap<NodeId, NodeIndex>,
}

impl DependencyGraph {
    /// Build a dependency graph from a workflow's enabled nodes and active edges.
    ///
    /// Disabled nodes and inactive (disabled or loop) edges are excluded
    /// entirely — they are invisible to both validation and scheduling.
    pub fn from_definition(workflow: &Workflow) -> Result<Self, WorkflowError> {
        let mut graph = DiGraph::new();
        let mut index_of = HashMap::new();

        for node in workflow.enabled_nodes() {
            let idx = graph.add_node(node.id);
            index_of.insert(node.id, idx);
        }

        for edge in workflow.active_edges() {
            let source = *index_of
                .get(&edge.source)
                .ok_or(WorkflowError::InvalidSourceNode(edge.source))?;
            let target = *index_of
                .get(&edge.target)
                .ok_or(WorkflowError::InvalidTargetNode(edge.target))?;
            if edge.source == edge.target {
                return Err(WorkflowError::SelfLoop(edge.source));
            }
            graph.add_edge(source, target, ());
        }

        Ok(Self { graph, index_of })
    }

    /// Number of nodes in the graph.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Nodes with no incoming edge (workflow start points).
    #[must_use]
    pub fn entry_nodes(&self) -> Vec<NodeId> {
        self.graph
            .node_indices()
            .filter(|&idx| {
                self.graph
                    .edges_directed(idx, petgraph::Direction::Incoming)
                    .next()
                    .is_none()
            })
            .map(|idx| self.graph[idx])
            .collect()
    }

    /// Nodes with no outgoing edge (workflow end points).
    #[must_use]
    pub fn exit_nodes(&self) -> Vec<NodeId> {
        self.graph
            .node_indices()
            .filter(|&idx| {
                self.graph
                    .edges_directed(idx, petgraph::Direction::Outgoing)
                    .next()
                    .is_none()
            })
            .map(|idx| self.graph[idx])
            .collect()
    }

    /// Enabled predecessors of `node`.
    #[must_use]
    pub fn predecessors(&self, node: NodeId) -> Vec<NodeId> {
        let Some(&idx) = self.index_of.get(&node) else {
            return Vec::new();
        };
        self.graph
            .neighbors_directed(idx, petgraph::Direction::Incoming)
            .map(|i| self.graph[i])
            .collect()
    }

    /// Enabled successors of `node`.
    #[must_use]
    pub fn successors(&self, node: NodeId) -> Vec<NodeId> {
        let Some(&idx) = self.index_of.get(&node) else {
            return Vec::new();
        };
        self.graph
            .neighbors_directed(idx, petgraph::Direction::Outgoing)
            .map(|i| self.graph[i])
            .collect()
    }

    /// Detect a cycle over enabled edges.
    ///
    /// Returns the first node found to close a cycle, if any.
    #[must_use]
    pub fn find_cycle(&self) -> Option<NodeId> {
        petgraph::algo::is_cyclic_directed(&self.graph).then(|| {
            // `toposort` fails exactly on the node it could not place; walk
            // it to recover a concrete offending node for the error message.
            match petgraph::algo::toposort(&self.graph, None) {
                Ok(_) => unreachable!("is_cyclic_directed and toposort disagree"),
                Err(cycle) => self.graph[cycle.node_id()],
            }
        })
    }

    /// Nodes unreachable from any entry node.
    #[must_use]
    pub fn unreachable_nodes(&self) -> Vec<NodeId> {
        let entries = self.entry_nodes();
        let mut reachable: HashSet<NodeIndex> = HashSet::new();
        let mut queue: VecDeque<NodeIndex> = entries
            .iter()
            .filter_map(|id| self.index_of.get(id).copied())
            .collect();

        while let Some(idx) = queue.pop_front() {
            if !reachable.insert(idx) {
                continue;
            }
            for neighbor in self.graph.neighbors_directed(idx, petgraph::Direction::Outgoing) {
                queue.push_back(neighbor);
            }
        }

        self.graph
            .node_indices()
            .filter(|idx| !reachable.contains(idx))
            .map(|idx| self.graph[idx])
            .collect()
    }

    /// Count of nodes with more than one enabled outgoing edge — the decision
    /// points `ComplexityMetrics`'s cyclomatic-style score treats as
    /// conditional nodes.
    #[must_use]
    pub fn branch_node_count(&self) -> usize {
        self.graph
            .node_indices()
            .filter(|&idx| {
                self.graph
                    .edges_directed(idx, petgraph::Direction::Outgoing)
                    .count()
                    > 1
            })
            .count()
    }

    /// Nodes with no enabled incident edge at all (neither predecessor nor successor).
    #[must_use]
    pub fn orphan_nodes(&self) -> Vec<NodeId> {
        self.graph
            .node_indices()
            .filter(|&idx| {
                self.graph
                    .edges_directed(idx, petgraph::Direction::Incoming)
                    .next()
                    .is_none()
                    && self
                        .graph
                        .edges_directed(idx, petgraph::Direction::Outgoing)
                        .next()
                        .is_none()
            })
            .map(|idx| self.graph[idx])
            .collect()
    }

    /// Topological order over enabled edges (Kahn's algorithm).
    ///
    /// Used only for display; the scheduler never relies on this ordering.
    pub fn topological_order(&self) -> Result<Vec<NodeId>, WorkflowError> {
        petgraph::algo::toposort(&self.graph, None)
            .map(|order| order.into_iter().map(|idx| self.graph[idx]).collect())
            .map_err(|cycle| WorkflowError::CycleDetected(self.graph[cycle.node_id()]))
    }

    /// Partition nodes into levels such that every node in level `k` depends
    /// only on nodes in levels `< k`, and no node in level `k` depends on
    /// another node in level `k`. Nodes within a level may run concurrently.
    pub fn compute_levels(&self) -> Result<Vec<Vec<NodeId>>, WorkflowError> {
        let mut in_degree: HashMap<NodeIndex, usize> = self
            .graph
            .node_indices()
            .map(|idx| {
                (
                    idx,
                    self.graph
                        .edges_directed(idx, petgraph::Direction::Incoming)
                        .count(),
                )
            })
            .collect();

        let mut levels = Vec::new();
        let mut remaining = self.graph.node_count();
        let mut frontier: Vec<NodeIndex> = in_degree
            .iter()
            .filter(|(_, &deg)| deg == 0)
            .map(|(&idx, _)| idx)
            .collect();

        while !frontier.is_empty() {
            frontier.sort_by_key(|idx| self.graph[*idx]);
            let mut next_frontier = Vec::new();
            for &idx in &frontier {
                remaining -= 1;
                for neighbor in self.graph.neighbors_directed(idx, petgraph::Direction::Outgoing) {
                    let deg = in_degree.get_mut(&neighbor).expect("tracked node");
                    *deg -= 1;
                    if *deg == 0 {
                        next_frontier.push(neighbor);
                    }
                }
            }
            levels.push(frontier.iter().map(|&idx| self.graph[idx]).collect());
            frontier = next_frontier;
        }

        if remaining != 0 {
            return Err(WorkflowError::CycleDetected(
                self.graph[NodeIndex::new(0)],
            ));
        }

        Ok(levels)
    }
}
