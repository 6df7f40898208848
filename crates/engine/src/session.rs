//! The Session Registry: tracks the one live execution per workflow and the
//! per-execution runtime state no persisted record carries (locks, output
//! cache, cancellation).

use std::sync::Arc;

use dashmap::DashMap;
use flux_core::{ExecutionId, NodeId, WorkflowId};
use flux_execution::{NodeOutputFile, WorkflowDataContract, WorkflowExecution};
use tokio::sync::{RwLock, Semaphore};
use tokio_util::sync::CancellationToken;

/// The runtime state of a single in-flight (or recently finished) execution.
///
/// Holds what `WorkflowExecution` itself cannot: a lock on which nodes are
/// currently dispatched, a cache of each completed node's output contract for
/// the propagator to read, the per-execution concurrency gate, and the root
/// cancellation token failures and `Cancel` calls fire.
pub struct ExecutionSession {
    /// The execution this session tracks.
    pub execution_id: ExecutionId,
    /// The workflow this execution runs.
    pub workflow_id: WorkflowId,
    /// The persisted-shaped execution record, held behind an async lock since
    /// the scheduler reads and writes it from concurrently running node tasks.
    pub state: RwLock<WorkflowExecution>,
    /// Each completed node's output contract, keyed by node. Read by the
    /// propagator when building a successor's input.
    pub node_outputs: DashMap<NodeId, WorkflowDataContract>,
    /// Output files each completed node's runner reported, keyed by node.
    pub node_output_files: DashMap<NodeId, Vec<NodeOutputFile>>,
    /// Nodes currently admitted for dispatch. Presence of a key is the lock;
    /// there is no value worth storing.
    pub running_nodes: DashMap<NodeId, ()>,
    /// Caps how many nodes of this execution run at once.
    pub node_semaphore: Arc<Semaphore>,
    /// Cancelling this token stops the execution; node tasks race it against
    /// their runner call and the scheduler checks it before every admission.
    pub cancellation: CancellationToken,
}

impl ExecutionSession {
    /// Build a new session around an already-constructed execution record.
    #[must_use]
    pub fn new(state: WorkflowExecution, max_concurrent_nodes: usize) -> Self {
        Self {
            execution_id: state.execution_id,
            workflow_id: state.workflow_id,
            node_semaphore: Arc::new(Semaphore::new(max_concurrent_nodes.max(1))),
            cancellation: CancellationToken::new(),
            state: RwLock::new(state),
            node_outputs: DashMap::new(),
            node_output_files: DashMap::new(),
            running_nodes: DashMap::new(),
        }
    }

    /// Atomically claim the right to dispatch `node_id`.
    ///
    /// Returns `false` if the node is already admitted; the caller must not
    /// dispatch it a second time concurrently.
    #[must_use]
    pub fn try_admit_node(&self, node_id: NodeId) -> bool {
        match self.running_nodes.entry(node_id) {
            dashmap::mapref::entry::Entry::Occupied(_) => false,
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(());
                true
            }
        }
    }

    /// Release a previously admitted node, allowing it to be dispatched again
    /// (a retry, most commonly).
    pub fn release_node(&self, node_id: NodeId) {
        self.running_nodes.remove(&node_id);
    }

    /// Whether the execution's root cancellation token has fired.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

/// Tracks the single live [`ExecutionSession`] permitted per workflow, plus the
/// process-wide cap on how many executions run concurrently.
///
/// Grounded on the same admission-conflict shape §4.2 describes:
/// `TryAdmit` must fail, atomically, the instant a second execution of the
/// same workflow is attempted while one is already live.
pub struct SessionRegistry {
    sessions: DashMap<ExecutionId, Arc<ExecutionSession>>,
    live_by_workflow: DashMap<WorkflowId, ExecutionId>,
    execution_semaphore: Arc<Semaphore>,
}

impl SessionRegistry {
    /// Build a registry capping concurrent executions at `max_concurrent_executions`.
    #[must_use]
    pub fn new(max_concurrent_executions: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            live_by_workflow: DashMap::new(),
            execution_semaphore: Arc::new(Semaphore::new(max_concurrent_executions.max(1))),
        }
    }

    /// The process-wide execution concurrency gate, acquired once per
    /// execution for its full lifetime.
    #[must_use]
    pub fn execution_semaphore(&self) -> Arc<Semaphore> {
        Arc::clone(&self.execution_semaphore)
    }

    /// Register `session` as the live execution of its workflow.
    ///
    /// Fails with the conflicting execution's id if one is already running
    /// for the same workflow; the caller never overwrites it.
    pub fn try_admit(&self, session: Arc<ExecutionSession>) -> Result<(), ExecutionId> {
        match self.live_by_workflow.entry(session.workflow_id) {
            dashmap::mapref::entry::Entry::Occupied(existing) => Err(*existing.get()),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(session.execution_id);
                self.sessions.insert(session.execution_id, session);
                Ok(())
            }
        }
    }

    /// Look up a session by execution id.
    #[must_use]
    pub fn get(&self, execution_id: ExecutionId) -> Option<Arc<ExecutionSession>> {
        self.sessions.get(&execution_id).map(|s| Arc::clone(&s))
    }

    /// Remove a session, freeing its workflow to be run again.
    ///
    /// Only removes the `live_by_workflow` entry when it still points at this
    /// execution, so a superseding session (there should never be one, but
    /// defensively) is never evicted by a stale finalize.
    pub fn remove(&self, execution_id: ExecutionId) -> Option<Arc<ExecutionSession>> {
        let removed = self.sessions.remove(&execution_id).map(|(_, s)| s);
        if let Some(session) = &removed {
            self.live_by_workflow
                .remove_if(&session.workflow_id, |_, v| *v == execution_id);
        }
        removed
    }

    /// Whether any execution of `workflow_id` is currently live.
    #[must_use]
    pub fn is_running(&self, workflow_id: WorkflowId) -> bool {
        self.live_by_workflow.contains_key(&workflow_id)
    }

    /// The live execution id of `workflow_id`, if any.
    #[must_use]
    pub fn running_execution_of(&self, workflow_id: WorkflowId) -> Option<ExecutionId> {
        self.live_by_workflow.get(&workflow_id).map(|id| *id)
    }

    /// All currently live execution ids.
    #[must_use]
    pub fn active_executions(&self) -> Vec<ExecutionId> {
        self.sessions.iter().map(|e| *e.key()).collect()
    }
}
