//! The Scheduler: admits nodes for dispatch, runs them against the program
//! runner, propagates their output to successors, and finalizes the
//! execution (§4.4).

use std::collections::HashMap;
use std::sync::Arc;

use flux_core::{Document, NodeId, UserId};
use flux_execution::{
    apply_output_mappings, ErrorDescriptor, ExecutionError, NodeOutputFile, NodeStatus,
    RunnerOutcome, Results, WorkflowErrorDescriptor, WorkflowStatus,
};
use flux_ports::{PortsError, ProgramRunner, ProjectExecutionRequest, ResourceLimits, WorkflowRepository};
use flux_workflow::{DependencyGraph, Node, Workflow};
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{info, instrument, warn};

use crate::interaction::{is_interactive, InteractionBridge};
use crate::propagator::{
    build_node_input, canonical_program_name, merge_ui_output, InputHelperArtifact,
    PredecessorOutput, INPUT_HELPER_ENV_VAR, UI_OUTPUT_ENV_VAR,
};
use crate::session::ExecutionSession;

/// Errors the scheduler's facade-facing operations can fail with.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// No such node exists in the execution.
    #[error("node {0} not found in execution")]
    NodeNotFound(NodeId),
    /// The node is not in a status the requested operation accepts.
    #[error("node {node_id} is in status {status}, which does not accept this operation")]
    InvalidNodeState {
        /// The node in question.
        node_id: NodeId,
        /// Its current status.
        status: NodeStatus,
    },
    /// `RetryNode` was called on a node that has exhausted its retry budget.
    #[error("node {0} has exhausted its retry budget")]
    RetryLimitExceeded(NodeId),
    /// A state-machine transition failed.
    #[error(transparent)]
    Execution(#[from] ExecutionError),
    /// A collaborator port failed.
    #[error(transparent)]
    Ports(#[from] PortsError),
}

/// Drives one execution of a workflow to completion, dispatching nodes as
/// their dependencies clear and propagating data between them.
pub struct Scheduler {
    workflow: Arc<Workflow>,
    graph: DependencyGraph,
    runner: Arc<dyn ProgramRunner>,
    repository: Arc<dyn WorkflowRepository>,
    interactions: Arc<InteractionBridge>,
    continue_on_error: bool,
}

impl Scheduler {
    /// Build a scheduler for one workflow definition.
    pub fn new(
        workflow: Arc<Workflow>,
        runner: Arc<dyn ProgramRunner>,
        repository: Arc<dyn WorkflowRepository>,
        interactions: Arc<InteractionBridge>,
    ) -> Result<Self, ExecutionError> {
        let graph = DependencyGraph::from_definition(&workflow)
            .map_err(|e| ExecutionError::PlanValidation(e.to_string()))?;
        let continue_on_error = workflow.config.continue_on_error_default;
        Ok(Self {
            workflow,
            graph,
            runner,
            repository,
            interactions,
            continue_on_error,
        })
    }

    /// Run an execution from its entry nodes through to a terminal status (or
    /// until a node suspends on `WaitingForInput` with no other node active).
    #[instrument(skip(self, session), fields(execution_id = %session.execution_id))]
    pub async fn run(self: &Arc<Self>, session: Arc<ExecutionSession>, user_id: UserId) {
        {
            let mut state = session.state.write().await;
            if state.status == WorkflowStatus::Pending {
                let _ = state.transition_to(WorkflowStatus::Running);
                state.log("execution started");
            }
        }
        self.persist_execution(&session).await;

        let mut join_set = JoinSet::new();
        for entry in self.graph.entry_nodes() {
            self.try_start_node(&session, &mut join_set, entry, user_id).await;
        }
        self.drain(&session, &mut join_set, user_id).await;
        self.finalize(&session).await;
    }

    /// Drain a join set, cascading each completed node's successors back into
    /// it, until no task remains pending.
    async fn drain(
        self: &Arc<Self>,
        session: &Arc<ExecutionSession>,
        join_set: &mut JoinSet<Option<NodeId>>,
        user_id: UserId,
    ) {
        while let Some(result) = join_set.join_next().await {
            let Ok(Some(node_id)) = result else {
                continue;
            };
            for succ in self.graph.successors(node_id) {
                self.try_start_node(session, join_set, succ, user_id).await;
            }
        }
    }

    /// Attempt to admit `node_id` for dispatch: checks cancellation, claims
    /// the per-node admission lock, rechecks the node is `Pending` with every
    /// dependency satisfied, then spawns its execution under the per-execution
    /// node semaphore.
    async fn try_start_node(
        self: &Arc<Self>,
        session: &Arc<ExecutionSession>,
        join_set: &mut JoinSet<Option<NodeId>>,
        node_id: NodeId,
        user_id: UserId,
    ) {
        if session.is_cancelled() {
            return;
        }
        let Some(node) = self.workflow.node(node_id) else {
            return;
        };
        if !session.try_admit_node(node_id) {
            return;
        }

        let eligible = {
            let state = session.state.read().await;
            let ready = state
                .node(node_id)
                .is_some_and(|ne| ne.status == NodeStatus::Pending);
            ready && self.predecessors_satisfied(&state, node)
        };
        if !eligible {
            session.release_node(node_id);
            return;
        }

        let scheduler = Arc::clone(self);
        let session = Arc::clone(session);
        let node = node.clone();
        let semaphore = Arc::clone(&session.node_semaphore);
        join_set.spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return None;
            };
            scheduler.execute_node(&session, &node, user_id).await;
            Some(node_id)
        });
    }

    fn predecessors_satisfied(
        &self,
        state: &flux_execution::WorkflowExecution,
        node: &Node,
    ) -> bool {
        self.graph.predecessors(node.id).iter().all(|&pred_id| {
            let satisfied = state
                .node(pred_id)
                .is_some_and(|ne| ne.status.satisfies_dependency());
            satisfied || self.has_optional_unsatisfied_mapping(node, pred_id)
        })
    }

    fn has_optional_unsatisfied_mapping(&self, node: &Node, pred_id: NodeId) -> bool {
        node.inputs
            .input_mappings
            .iter()
            .any(|m| m.source_node_id == pred_id && m.is_optional)
    }

    /// Run a single admitted node: transition it to `Running`, build its
    /// input via the propagator, then either suspend it (interactive) or run
    /// it against the program runner.
    async fn execute_node(self: &Arc<Self>, session: &Arc<ExecutionSession>, node: &Node, user_id: UserId) {
        let predecessors = self.collect_predecessor_outputs(session, node.id);
        let propagated = {
            let state = session.state.read().await;
            build_node_input(node, &predecessors, &state.context)
        };
        for warning in &propagated.warnings {
            self.log(session, format!("node {}: {warning}", node.id)).await;
        }

        {
            let mut state = session.state.write().await;
            if let Some(ne) = state.node_executions.get_mut(&node.id) {
                ne.input_document = propagated.document.clone();
                if let Err(e) = ne.transition_to(NodeStatus::Running) {
                    warn!(node_id = %node.id, error = %e, "could not start node");
                    session.release_node(node.id);
                    return;
                }
            }
            state.recompute_progress();
        }
        self.persist_node(session, node.id).await;

        if is_interactive(&node.settings.ui_type, node.settings.ui_schema.is_some()) {
            self.suspend_for_input(session, node).await;
            return;
        }

        self.run_and_record(
            session,
            node,
            propagated.document,
            &propagated.helper_artifact,
            Vec::new(),
            user_id,
        )
        .await;
    }

    fn collect_predecessor_outputs(
        &self,
        session: &Arc<ExecutionSession>,
        node_id: NodeId,
    ) -> Vec<PredecessorOutput> {
        self.graph
            .predecessors(node_id)
            .into_iter()
            .filter_map(|pred_id| {
                let contract = session.node_outputs.get(&pred_id)?.clone();
                let name = self
                    .workflow
                    .node(pred_id)
                    .map(|n| canonical_program_name(&n.name))?;
                Some(PredecessorOutput {
                    node_id: pred_id,
                    canonical_name: name,
                    contract,
                })
            })
            .collect()
    }

    async fn suspend_for_input(self: &Arc<Self>, session: &Arc<ExecutionSession>, node: &Node) {
        let schema = node
            .settings
            .ui_schema
            .clone()
            .unwrap_or_else(flux_core::empty_document);
        match self
            .interactions
            .suspend(session.execution_id, node.id, schema)
            .await
        {
            Ok(_) => {
                let mut state = session.state.write().await;
                if let Some(ne) = state.node_executions.get_mut(&node.id) {
                    let _ = ne.transition_to(NodeStatus::WaitingForInput);
                }
                drop(state);
                self.persist_node(session, node.id).await;
                session.release_node(node.id);
            }
            Err(e) => {
                warn!(node_id = %node.id, error = %e, "failed to suspend node for input");
                self.fail_node(session, node.id, ErrorDescriptor::system_error(e.to_string()))
                    .await;
            }
        }
    }

    /// Race the program runner against cancellation, record the outcome.
    ///
    /// `helper_artifact` (the canonical-program-name → predecessor-document
    /// map, §4.3) is serialized under `WORKFLOW_INPUTS_CONTENT`.
    /// `extra_environment` carries any further well-known keys a caller
    /// needs set — a UI-interaction resume adds `UI_OUTPUT_DATA` this way.
    #[instrument(skip(self, session, input, helper_artifact), fields(node_id = %node.id))]
    async fn run_and_record(
        self: &Arc<Self>,
        session: &Arc<ExecutionSession>,
        node: &Node,
        input: Document,
        helper_artifact: &InputHelperArtifact,
        extra_environment: Vec<(String, String)>,
        user_id: UserId,
    ) {
        let mut environment = node.settings.environment_overrides.clone();
        if let Ok(helper) = serde_json::to_string(helper_artifact) {
            environment.insert(INPUT_HELPER_ENV_VAR.to_string(), helper);
        }
        for (key, value) in extra_environment {
            environment.insert(key, value);
        }

        let request = ProjectExecutionRequest {
            program_id: node.program_id,
            version_id: node.version_id,
            user_id,
            parameters: input,
            environment,
            timeout_minutes: node.settings.timeout_minutes,
            resource_limits: ResourceLimits {
                max_cpu_percentage: node.settings.max_cpu_percentage,
                max_memory_mb: node.settings.max_memory_mb,
                max_disk_mb: node.settings.max_disk_mb,
            },
        };

        let outcome = tokio::select! {
            biased;
            () = session.cancellation.cancelled() => {
                self.log(session, format!("node {} cancelled before completion", node.id)).await;
                let _ = self.repository.cancel_execution(session.execution_id).await;
                session.release_node(node.id);
                return;
            }
            result = self.runner.execute_project(request) => result,
        };

        match outcome {
            Ok(result) => self.record_runner_result(session, node, result).await,
            Err(e) if matches!(e, PortsError::Timeout { .. }) => {
                self.fail_node(session, node.id, ErrorDescriptor::timeout_error(e.to_string()))
                    .await;
            }
            Err(e) => {
                self.fail_node(session, node.id, ErrorDescriptor::system_error(e.to_string()))
                    .await;
            }
        }
        session.release_node(node.id);
    }

    async fn record_runner_result(
        self: &Arc<Self>,
        session: &Arc<ExecutionSession>,
        node: &Node,
        result: flux_ports::ProjectExecutionResult,
    ) {
        // `ProjectExecutionResult` carries its structured output, if any, only
        // as a freeform `output` string; there is no separate JSON field in
        // the port contract. Best-effort parse it as the node's output
        // document, falling back to an empty object for plain-text programs.
        let output_document = serde_json::from_str(&result.output).unwrap_or_else(|_| flux_core::empty_document());

        let outcome = RunnerOutcome {
            stdout: result.output,
            stderr: result.error_output,
            exit_code: result.exit_code,
            success: result.success,
            duration: result.duration,
            output_files: result
                .output_files
                .into_iter()
                .map(|f| NodeOutputFile {
                    file_name: f.file_name,
                    path: f.path,
                })
                .collect(),
            output_document,
        };

        let contract = apply_output_mappings(&outcome, &node.outputs);
        session.node_outputs.insert(node.id, contract.clone());
        if !outcome.output_files.is_empty() {
            session.node_output_files.insert(node.id, outcome.output_files.clone());
        }

        let mut state = session.state.write().await;
        if let Some(ne) = state.node_executions.get_mut(&node.id) {
            ne.output_document = serde_json::to_value(&contract).unwrap_or_default();
            if outcome.success {
                let _ = ne.transition_to(NodeStatus::Completed);
            } else {
                ne.error = Some(ErrorDescriptor::execution_error(
                    result.error_message.unwrap_or_else(|| "node execution failed".to_string()),
                    outcome.exit_code,
                ));
                let _ = ne.transition_to(NodeStatus::Failed);
            }
        }
        state.recompute_progress();
        let failed = !outcome.success;
        drop(state);

        self.persist_node(session, node.id).await;
        if failed {
            self.maybe_abort(session).await;
        }
    }

    async fn fail_node(self: &Arc<Self>, session: &Arc<ExecutionSession>, node_id: NodeId, error: ErrorDescriptor) {
        let mut state = session.state.write().await;
        if let Some(ne) = state.node_executions.get_mut(&node_id) {
            ne.error = Some(error);
            let _ = ne.transition_to(NodeStatus::Failed);
        }
        state.recompute_progress();
        drop(state);
        self.persist_node(session, node_id).await;
        self.maybe_abort(session).await;
    }

    /// Cancel the whole execution if `continue_on_error` is false.
    async fn maybe_abort(&self, session: &Arc<ExecutionSession>) {
        if !self.continue_on_error {
            session.cancellation.cancel();
        }
    }

    /// Resume the subtree rooted at `node_id`'s successors, after an external
    /// event (a completed UI interaction, or a facade-initiated retry/skip)
    /// changed `node_id`'s status. Waits for the whole resulting subtree to
    /// drain before finalizing, matching §4.5's background
    /// continuation contract.
    pub async fn cascade_successors(self: &Arc<Self>, session: &Arc<ExecutionSession>, node_id: NodeId, user_id: UserId) {
        let mut join_set = JoinSet::new();
        for succ in self.graph.successors(node_id) {
            self.try_start_node(session, &mut join_set, succ, user_id).await;
        }
        self.drain(session, &mut join_set, user_id).await;
        self.finalize(session).await;
    }

    /// Re-enter a node whose UI interaction just completed (§4.5 resume
    /// steps 5-6): merge the UI output into its prepared input document,
    /// run the program with `UI_OUTPUT_DATA` set, record its terminal
    /// status, then cascade into its successors exactly as a normal node
    /// completion would.
    pub async fn resume_node(
        self: &Arc<Self>,
        session: &Arc<ExecutionSession>,
        node_id: NodeId,
        ui_output: Document,
        user_id: UserId,
    ) -> Result<(), SchedulerError> {
        let node = self
            .workflow
            .node(node_id)
            .cloned()
            .ok_or(SchedulerError::NodeNotFound(node_id))?;

        {
            let state = session.state.read().await;
            let ne = state
                .node_executions
                .get(&node_id)
                .ok_or(SchedulerError::NodeNotFound(node_id))?;
            if ne.status != NodeStatus::WaitingForInput {
                return Err(SchedulerError::InvalidNodeState {
                    node_id,
                    status: ne.status,
                });
            }
        }

        let predecessors = self.collect_predecessor_outputs(session, node_id);
        let propagated = {
            let state = session.state.read().await;
            build_node_input(&node, &predecessors, &state.context)
        };
        let merged_input = merge_ui_output(&propagated.document, &ui_output);

        {
            let mut state = session.state.write().await;
            if let Some(ne) = state.node_executions.get_mut(&node_id) {
                ne.input_document = merged_input.clone();
                ne.transition_to(NodeStatus::Running)?;
            }
            state.recompute_progress();
        }
        self.persist_node(session, node_id).await;

        session.try_admit_node(node_id);
        let ui_output_env = serde_json::to_string(&ui_output).unwrap_or_default();
        self.run_and_record(
            session,
            &node,
            merged_input,
            &propagated.helper_artifact,
            vec![(UI_OUTPUT_ENV_VAR.to_string(), ui_output_env)],
            user_id,
        )
        .await;
        session.release_node(node_id);

        self.cascade_successors(session, node_id, user_id).await;
        Ok(())
    }

    /// Dispatch a single node directly (bypassing admission eligibility
    /// rechecks), then cascade into its successors. Used by `RetryNode`.
    pub async fn dispatch_node(self: &Arc<Self>, session: &Arc<ExecutionSession>, node_id: NodeId, user_id: UserId) {
        let Some(node) = self.workflow.node(node_id) else {
            return;
        };
        session.try_admit_node(node_id);
        self.execute_node(session, node, user_id).await;
        session.release_node(node_id);
        self.cascade_successors(session, node_id, user_id).await;
    }

    /// Re-dispatch a previously failed node, incrementing its retry count.
    pub async fn retry_node(
        self: &Arc<Self>,
        session: &Arc<ExecutionSession>,
        node_id: NodeId,
        user_id: UserId,
    ) -> Result<(), SchedulerError> {
        {
            let mut state = session.state.write().await;
            let ne = state
                .node_executions
                .get_mut(&node_id)
                .ok_or(SchedulerError::NodeNotFound(node_id))?;
            if ne.status != NodeStatus::Failed {
                return Err(SchedulerError::InvalidNodeState {
                    node_id,
                    status: ne.status,
                });
            }
            if !ne.can_retry() {
                return Err(SchedulerError::RetryLimitExceeded(node_id));
            }
            ne.transition_to(NodeStatus::Retrying)?;
            if state.status == WorkflowStatus::Failed {
                state.transition_to(WorkflowStatus::Running)?;
            }
            state.recompute_progress();
        }
        self.persist_node(session, node_id).await;
        self.dispatch_node(session, node_id, user_id).await;
        Ok(())
    }

    /// Mark a node `Skipped`, an idempotent no-op if it already is, then
    /// cascade into its successors.
    pub async fn skip_node(
        self: &Arc<Self>,
        session: &Arc<ExecutionSession>,
        node_id: NodeId,
        reason: String,
        user_id: UserId,
    ) -> Result<(), SchedulerError> {
        let already_skipped = {
            let mut state = session.state.write().await;
            let ne = state
                .node_executions
                .get_mut(&node_id)
                .ok_or(SchedulerError::NodeNotFound(node_id))?;
            if ne.status == NodeStatus::Skipped {
                true
            } else {
                ne.skip_reason = Some(reason);
                ne.transition_to(NodeStatus::Skipped)?;
                state.recompute_progress();
                false
            }
        };
        if already_skipped {
            return Ok(());
        }
        self.persist_node(session, node_id).await;
        self.cascade_successors(session, node_id, user_id).await;
        Ok(())
    }

    /// Finalize the execution once every node has reached a terminal status
    /// (or the execution was cancelled). Leaves the session alive, without
    /// finalizing, while any node is still `WaitingForInput`.
    async fn finalize(&self, session: &Arc<ExecutionSession>) {
        let mut state = session.state.write().await;
        if state.status.is_terminal() {
            return;
        }
        let waiting_for_input = state
            .node_executions
            .values()
            .any(|ne| ne.status == NodeStatus::WaitingForInput);
        if waiting_for_input {
            return;
        }
        if !state.all_nodes_terminal() {
            return;
        }

        let failed_count = state
            .node_executions
            .values()
            .filter(|ne| ne.status == NodeStatus::Failed)
            .count();

        let target = if session.is_cancelled() {
            WorkflowStatus::Cancelled
        } else if failed_count > 0 {
            WorkflowStatus::Failed
        } else {
            WorkflowStatus::Completed
        };

        if target == WorkflowStatus::Failed {
            state.error = Some(WorkflowErrorDescriptor::failed_nodes(failed_count));
        }
        if target == WorkflowStatus::Completed || target == WorkflowStatus::Failed {
            state.results = Some(self.build_results(&state, session));
        }
        if state.transition_to(target).is_ok() {
            state.log(format!("execution finished: {target}"));
        }
        drop(state);
        info!(execution_id = %session.execution_id, status = %target, "execution finalized");
        self.persist_execution(session).await;
    }

    fn build_results(&self, state: &flux_execution::WorkflowExecution, session: &ExecutionSession) -> Results {
        let exit_nodes: std::collections::HashSet<NodeId> = self.graph.exit_nodes().into_iter().collect();
        let mut final_outputs = HashMap::new();
        let mut intermediate_results = HashMap::new();
        let mut output_files = HashMap::new();

        for entry in session.node_outputs.iter() {
            let node_id = *entry.key();
            let doc = serde_json::to_value(entry.value()).unwrap_or_default();
            intermediate_results.insert(node_id, doc.clone());
            if exit_nodes.contains(&node_id) {
                final_outputs.insert(node_id, doc);
            }
        }
        for entry in session.node_output_files.iter() {
            output_files.insert(*entry.key(), entry.value().clone());
        }

        let completed = state
            .node_executions
            .values()
            .filter(|ne| ne.status == NodeStatus::Completed)
            .count();
        let total = state.node_executions.len();

        Results {
            final_outputs,
            intermediate_results,
            output_files,
            summary: format!("{completed} of {total} nodes completed"),
        }
    }

    async fn log(&self, session: &Arc<ExecutionSession>, message: impl Into<String>) {
        let mut state = session.state.write().await;
        state.log(message);
    }

    async fn persist_node(&self, session: &Arc<ExecutionSession>, node_id: NodeId) {
        let state = session.state.read().await;
        let Some(ne) = state.node(node_id) else { return };
        let value = serde_json::to_value(ne).unwrap_or_default();
        drop(state);
        if let Err(e) = self
            .repository
            .update_node_execution(session.execution_id, node_id, value)
            .await
        {
            warn!(node_id = %node_id, error = %e, "failed to persist node execution");
        }
    }

    async fn persist_execution(&self, session: &Arc<ExecutionSession>) {
        let state = session.state.read().await;
        let value = serde_json::to_value(&*state).unwrap_or_default();
        drop(state);
        if let Err(e) = self
            .repository
            .update_execution_status(session.execution_id, value)
            .await
        {
            warn!(execution_id = %session.execution_id, error = %e, "failed to persist execution status");
        }
    }
}
