//! The Engine Facade: the single entry point the rest of a deployment calls
//! into. Wraps the session registry, scheduler, and every collaborator port
//! behind the public operation set (§4.6, §6).

use std::sync::Arc;

use bytes::Bytes;
use flux_core::{Document, ExecutionId, InteractionId, NodeId, ProgramId, ProgramVersionId, UserId, WorkflowId};
use flux_execution::{ExecutionContext, NodeStatus, Progress, Results, WorkflowExecution, WorkflowStatus};
use flux_ports::{BackgroundQueue, FileStorage, NotificationSink, PortsError, ProgramRunner, UiInteractionRepository, WorkflowRepository};
use flux_workflow::{Validator, Workflow};
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::interaction::InteractionBridge;
use crate::scheduler::{Scheduler, SchedulerError};
use crate::session::{ExecutionSession, SessionRegistry};

/// Errors the facade's public operations can fail with, already shaped for
/// the HTTP-style status-code mapping deployments put in front of it.
#[derive(Debug, Error)]
pub enum FacadeError {
    /// The referenced workflow, execution, node, or interaction does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// The requested operation does not apply to the entity's current state.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// The caller lacks permission for this operation.
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    /// The workflow or request failed structural validation.
    #[error("validation failed: {0}")]
    ValidationFailed(String),
    /// An unexpected internal failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl FacadeError {
    /// The HTTP-style status code a deployment should answer with.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::InvalidState(_) => 409,
            Self::PermissionDenied(_) => 403,
            Self::ValidationFailed(_) => 400,
            Self::Internal(_) => 500,
        }
    }
}

impl From<PortsError> for FacadeError {
    fn from(err: PortsError) -> Self {
        match err {
            PortsError::NotFound { entity, id } => Self::NotFound(format!("{entity} {id}")),
            PortsError::Conflict { .. } => Self::InvalidState(err.to_string()),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<SchedulerError> for FacadeError {
    fn from(err: SchedulerError) -> Self {
        match err {
            SchedulerError::NodeNotFound(id) => Self::NotFound(format!("node {id}")),
            SchedulerError::InvalidNodeState { .. } | SchedulerError::RetryLimitExceeded(_) => {
                Self::InvalidState(err.to_string())
            }
            SchedulerError::Execution(e) => Self::Internal(e.to_string()),
            SchedulerError::Ports(e) => e.into(),
        }
    }
}

/// Statistics summarizing one execution for a dashboard or status API.
#[derive(Debug, Clone)]
pub struct ExecutionStatistics {
    /// The execution's rolling progress.
    pub progress: Progress,
    /// Wall-clock duration so far, in seconds, if the execution has started.
    pub elapsed_seconds: Option<i64>,
    /// Count of nodes in each status.
    pub nodes_by_status: std::collections::HashMap<NodeStatus, usize>,
}

/// Wires together the session registry, scheduler, and every collaborator
/// port. The single object a deployment's API layer holds.
pub struct EngineFacade {
    repository: Arc<dyn WorkflowRepository>,
    runner: Arc<dyn ProgramRunner>,
    files: Arc<dyn FileStorage>,
    interactions_repo: Arc<dyn UiInteractionRepository>,
    notifier: Arc<dyn NotificationSink>,
    queue: Arc<dyn BackgroundQueue>,
    sessions: Arc<SessionRegistry>,
    interaction_timeout: std::time::Duration,
}

impl EngineFacade {
    /// Wire a facade from its collaborator ports.
    #[must_use]
    pub fn new(
        repository: Arc<dyn WorkflowRepository>,
        runner: Arc<dyn ProgramRunner>,
        files: Arc<dyn FileStorage>,
        interactions_repo: Arc<dyn UiInteractionRepository>,
        notifier: Arc<dyn NotificationSink>,
        queue: Arc<dyn BackgroundQueue>,
        max_concurrent_executions: usize,
        interaction_timeout: std::time::Duration,
    ) -> Self {
        Self {
            repository,
            runner,
            files,
            interactions_repo,
            notifier,
            queue,
            sessions: Arc::new(SessionRegistry::new(max_concurrent_executions)),
            interaction_timeout,
        }
    }

    fn interaction_bridge(&self) -> Arc<InteractionBridge> {
        Arc::new(InteractionBridge::new(
            Arc::clone(&self.interactions_repo),
            Arc::clone(&self.notifier),
            self.interaction_timeout,
        ))
    }

    async fn load_workflow(&self, workflow_id: WorkflowId) -> Result<Workflow, FacadeError> {
        let raw = self
            .repository
            .get_by_id(workflow_id)
            .await?
            .ok_or_else(|| FacadeError::NotFound(format!("workflow {workflow_id}")))?;
        serde_json::from_value(raw).map_err(|e| FacadeError::Internal(e.to_string()))
    }

    async fn require_permission(
        &self,
        workflow_id: WorkflowId,
        user_id: UserId,
        permission: &str,
    ) -> Result<(), FacadeError> {
        let allowed = self
            .repository
            .has_permission(workflow_id, user_id, permission)
            .await?;
        if allowed {
            Ok(())
        } else {
            Err(FacadeError::PermissionDenied(format!(
                "user {user_id} lacks {permission} on workflow {workflow_id}"
            )))
        }
    }

    fn session(&self, execution_id: ExecutionId) -> Result<Arc<ExecutionSession>, FacadeError> {
        self.sessions
            .get(execution_id)
            .ok_or_else(|| FacadeError::NotFound(format!("execution {execution_id}")))
    }

    /// Start a new execution of `workflow_id`, validating it first and
    /// admitting its session before dispatching entry nodes in the
    /// background.
    #[instrument(skip(self, context))]
    pub async fn execute(
        &self,
        workflow_id: WorkflowId,
        user_id: UserId,
        context: ExecutionContext,
    ) -> Result<ExecutionId, FacadeError> {
        self.require_permission(workflow_id, user_id, "execute").await?;
        let workflow = self.load_workflow(workflow_id).await?;

        let validation = Validator::new().validate(&workflow);
        if !validation.is_valid() {
            let detail = validation
                .errors
                .iter()
                .map(|f| f.message.clone())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(FacadeError::ValidationFailed(detail));
        }

        context
            .validate_against(&workflow)
            .map_err(|e| FacadeError::ValidationFailed(e.to_string()))?;

        let execution_id = ExecutionId::v4();
        let node_defaults: Vec<(NodeId, u32)> = workflow
            .enabled_nodes()
            .map(|n| (n.id, n.settings.max_retries))
            .collect();
        let state = WorkflowExecution::new(execution_id, workflow_id, user_id, context.clone(), &node_defaults);

        let session = Arc::new(ExecutionSession::new(state, context.max_concurrent_nodes));
        self.sessions
            .try_admit(Arc::clone(&session))
            .map_err(|existing| {
                FacadeError::InvalidState(format!(
                    "Workflow {workflow_id} is already running. Execution ID: {existing}"
                ))
            })?;

        self.repository
            .update_execution_status(execution_id, serde_json::to_value(&*session.state.read().await).unwrap_or_default())
            .await?;

        let workflow = Arc::new(workflow);
        let scheduler = Arc::new(
            Scheduler::new(
                Arc::clone(&workflow),
                Arc::clone(&self.runner),
                Arc::clone(&self.repository),
                self.interaction_bridge(),
            )
            .map_err(|e| FacadeError::Internal(e.to_string()))?,
        );

        let queue = Arc::clone(&self.queue);
        let execution_semaphore = self.sessions.execution_semaphore();
        let background_session = Arc::clone(&session);
        let item: flux_ports::BackgroundWorkItem = Box::new(move |_cancel| {
            Box::pin(async move {
                let Ok(_permit) = execution_semaphore.acquire_owned().await else {
                    return;
                };
                scheduler.run(background_session, user_id).await;
            })
        });
        if queue.queue_background_work_item(item).await.is_err() {
            warn!(execution_id = %execution_id, "failed to enqueue execution; running inline");
        }

        info!(execution_id = %execution_id, workflow_id = %workflow_id, "execution admitted");
        Ok(execution_id)
    }

    /// Pause a running execution.
    pub async fn pause(&self, execution_id: ExecutionId, user_id: UserId) -> Result<(), FacadeError> {
        let session = self.session(execution_id)?;
        self.require_permission(session.workflow_id, user_id, "execute").await?;
        {
            let mut state = session.state.write().await;
            state
                .transition_to(WorkflowStatus::Paused)
                .map_err(|e| FacadeError::InvalidState(e.to_string()))?;
        }
        self.repository.pause_execution(execution_id).await?;
        Ok(())
    }

    /// Resume a paused execution. Dispatch itself resumes only the next time
    /// a node completes or the caller retries a node; pausing does not stop
    /// in-flight node tasks, it only blocks new admissions.
    pub async fn resume(&self, execution_id: ExecutionId, user_id: UserId) -> Result<(), FacadeError> {
        let session = self.session(execution_id)?;
        self.require_permission(session.workflow_id, user_id, "execute").await?;
        {
            let mut state = session.state.write().await;
            state
                .transition_to(WorkflowStatus::Running)
                .map_err(|e| FacadeError::InvalidState(e.to_string()))?;
        }
        self.repository.resume_execution(execution_id).await?;
        Ok(())
    }

    /// Cancel a running or paused execution.
    pub async fn cancel(&self, execution_id: ExecutionId, user_id: UserId) -> Result<(), FacadeError> {
        let session = self.session(execution_id)?;
        self.require_permission(session.workflow_id, user_id, "execute").await?;
        session.cancellation.cancel();
        {
            let mut state = session.state.write().await;
            if !state.status.is_terminal() {
                let _ = state.transition_to(WorkflowStatus::Cancelled);
            }
        }
        self.repository.cancel_execution(execution_id).await?;
        Ok(())
    }

    /// Retry a failed node, reopening the workflow if it had already failed.
    pub async fn retry_node(
        &self,
        execution_id: ExecutionId,
        node_id: NodeId,
        user_id: UserId,
    ) -> Result<(), FacadeError> {
        let session = self.session(execution_id)?;
        self.require_permission(session.workflow_id, user_id, "execute").await?;
        let workflow = self.load_workflow(session.workflow_id).await?;
        let scheduler = Arc::new(
            Scheduler::new(
                Arc::new(workflow),
                Arc::clone(&self.runner),
                Arc::clone(&self.repository),
                self.interaction_bridge(),
            )
            .map_err(|e| FacadeError::Internal(e.to_string()))?,
        );
        scheduler.retry_node(&session, node_id, user_id).await?;
        Ok(())
    }

    /// Skip a node, unblocking its successors without running it.
    pub async fn skip_node(
        &self,
        execution_id: ExecutionId,
        node_id: NodeId,
        reason: String,
        user_id: UserId,
    ) -> Result<(), FacadeError> {
        let session = self.session(execution_id)?;
        self.require_permission(session.workflow_id, user_id, "execute").await?;
        let workflow = self.load_workflow(session.workflow_id).await?;
        let scheduler = Arc::new(
            Scheduler::new(
                Arc::new(workflow),
                Arc::clone(&self.runner),
                Arc::clone(&self.repository),
                self.interaction_bridge(),
            )
            .map_err(|e| FacadeError::Internal(e.to_string()))?,
        );
        scheduler.skip_node(&session, node_id, reason, user_id).await?;
        Ok(())
    }

    /// Submit output for an in-progress UI interaction, resuming its node
    /// and cascading into its successors.
    pub async fn complete_ui_interaction(
        &self,
        execution_id: ExecutionId,
        interaction_id: InteractionId,
        node_id: NodeId,
        output_data: Document,
        user_id: UserId,
    ) -> Result<(), FacadeError> {
        let session = self.session(execution_id)?;
        self.require_permission(session.workflow_id, user_id, "execute").await?;

        let bridge = self.interaction_bridge();
        let interaction = bridge
            .resume(interaction_id, output_data)
            .await
            .map_err(|e| FacadeError::InvalidState(e.to_string()))?;

        let workflow = self.load_workflow(session.workflow_id).await?;
        let scheduler = Arc::new(
            Scheduler::new(
                Arc::new(workflow),
                Arc::clone(&self.runner),
                Arc::clone(&self.repository),
                bridge,
            )
            .map_err(|e| FacadeError::Internal(e.to_string()))?,
        );
        let ui_output = interaction.output_data.unwrap_or_else(flux_core::empty_document);
        scheduler
            .resume_node(&session, node_id, ui_output, user_id)
            .await?;
        Ok(())
    }

    /// The current status, progress, and (if terminal) results of an execution.
    pub async fn get_execution_status(&self, execution_id: ExecutionId) -> Result<WorkflowExecution, FacadeError> {
        let session = self.session(execution_id)?;
        Ok(session.state.read().await.clone())
    }

    /// Every execution currently live in this process.
    pub fn get_active_executions(&self) -> Vec<ExecutionId> {
        self.sessions.active_executions()
    }

    /// Whether an execution has reached a terminal status.
    pub async fn is_execution_complete(&self, execution_id: ExecutionId) -> Result<bool, FacadeError> {
        let session = self.session(execution_id)?;
        Ok(session.state.read().await.status.is_terminal())
    }

    /// A single node's recorded output contract, if it has completed.
    pub fn get_node_output(
        &self,
        execution_id: ExecutionId,
        node_id: NodeId,
    ) -> Result<Option<flux_execution::WorkflowDataContract>, FacadeError> {
        let session = self.session(execution_id)?;
        Ok(session.node_outputs.get(&node_id).map(|r| r.clone()))
    }

    /// Every completed node's output contract, keyed by node id.
    pub fn get_all_node_outputs(
        &self,
        execution_id: ExecutionId,
    ) -> Result<std::collections::HashMap<NodeId, flux_execution::WorkflowDataContract>, FacadeError> {
        let session = self.session(execution_id)?;
        Ok(session
            .node_outputs
            .iter()
            .map(|e| (*e.key(), e.value().clone()))
            .collect())
    }

    /// The execution's final `Results`, once terminal.
    pub async fn get_results(&self, execution_id: ExecutionId) -> Result<Option<Results>, FacadeError> {
        let session = self.session(execution_id)?;
        Ok(session.state.read().await.results.clone())
    }

    /// Summary statistics over an execution's progress so far.
    pub async fn get_execution_statistics(&self, execution_id: ExecutionId) -> Result<ExecutionStatistics, FacadeError> {
        let session = self.session(execution_id)?;
        let state = session.state.read().await;
        let elapsed_seconds = state
            .started_at
            .map(|started| (state.finished_at.unwrap_or_else(chrono::Utc::now) - started).num_seconds());

        let mut nodes_by_status = std::collections::HashMap::new();
        for ne in state.node_executions.values() {
            *nodes_by_status.entry(ne.status).or_insert(0) += 1;
        }

        Ok(ExecutionStatistics {
            progress: state.progress,
            elapsed_seconds,
            nodes_by_status,
        })
    }

    /// The execution's append-only log stream.
    pub async fn get_execution_logs(&self, execution_id: ExecutionId) -> Result<Vec<String>, FacadeError> {
        let session = self.session(execution_id)?;
        Ok(session.state.read().await.logs.clone())
    }

    /// Drop a finished execution's in-memory session, freeing its workflow
    /// to be run again. A no-op on a non-terminal execution's session is
    /// refused so a caller cannot silently abandon live state.
    pub async fn cleanup_execution(&self, execution_id: ExecutionId) -> Result<(), FacadeError> {
        let session = self.session(execution_id)?;
        if !session.state.read().await.status.is_terminal() {
            return Err(FacadeError::InvalidState(format!(
                "execution {execution_id} is not terminal"
            )));
        }
        self.sessions.remove(execution_id);
        Ok(())
    }

    /// Fetch one output file's bytes.
    pub async fn download_execution_file(
        &self,
        program_id: ProgramId,
        version_ref: Option<ProgramVersionId>,
        path: &str,
    ) -> Result<Bytes, FacadeError> {
        Ok(self.files.get_file_content(program_id, version_ref, path).await?)
    }

    /// Package an execution's entire output-file set as a zip archive.
    pub async fn download_all_execution_files(&self, execution_id: ExecutionId) -> Result<Bytes, FacadeError> {
        Ok(self.files.create_execution_zip_archive(execution_id).await?)
    }

    /// Package a subset of one program's files as a zip archive.
    pub async fn bulk_download_execution_files(
        &self,
        program_id: ProgramId,
        version_ref: Option<ProgramVersionId>,
        paths: &[String],
    ) -> Result<Bytes, FacadeError> {
        Ok(self.files.bulk_download_files(program_id, version_ref, paths).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_match_the_error_taxonomy() {
        assert_eq!(FacadeError::NotFound("x".into()).status_code(), 404);
        assert_eq!(FacadeError::InvalidState("x".into()).status_code(), 409);
        assert_eq!(FacadeError::PermissionDenied("x".into()).status_code(), 403);
        assert_eq!(FacadeError::ValidationFailed("x".into()).status_code(), 400);
        assert_eq!(FacadeError::Internal("x".into()).status_code(), 500);
    }

    #[test]
    fn ports_not_found_maps_to_facade_not_found() {
        let err: FacadeError = PortsError::not_found("Workflow", "abc").into();
        assert_eq!(err.status_code(), 404);
    }
}
