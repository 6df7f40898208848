//! Local, in-process implementations of the engine's collaborator ports.
//!
//! None of these talk to a real database, sandbox, or push-notification
//! system — the program runner, file storage, and repository layer are all
//! out of scope for the engine itself (§1). This module exists so the `run`
//! subcommand has something to hand `EngineFacade::new`; a real deployment
//! swaps every one of these out for its own driver.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use flux_core::{ExecutionId, InteractionId, NodeId, ProgramId, ProgramVersionId, UserId, WorkflowId};
use flux_ports::{
    BackgroundQueue, BackgroundWorkItem, FileStorage, PortsError, ProgramRunner,
    ProjectExecutionRequest, ProjectExecutionResult, UiInteractionRepository, WorkflowRepository,
};
use flux_workflow::Workflow;
use tokio_util::sync::CancellationToken;

/// Holds workflow definitions loaded from disk. Execution-record writes are
/// logged at debug level and otherwise dropped; this demo has no durable
/// store behind it.
#[derive(Default)]
pub struct LocalWorkflowRepository {
    workflows: DashMap<WorkflowId, Workflow>,
}

impl LocalWorkflowRepository {
    /// Register a workflow definition, making it available to `execute`.
    pub fn insert(&self, workflow: Workflow) {
        self.workflows.insert(workflow.id, workflow);
    }
}

#[async_trait]
impl WorkflowRepository for LocalWorkflowRepository {
    async fn get_by_id(&self, id: WorkflowId) -> Result<Option<serde_json::Value>, PortsError> {
        Ok(self.workflows.get(&id).map(|w| serde_json::to_value(w.value()).unwrap_or_default()))
    }

    async fn update_execution_status(
        &self,
        execution_id: ExecutionId,
        status: serde_json::Value,
    ) -> Result<(), PortsError> {
        tracing::debug!(%execution_id, %status, "execution status updated");
        Ok(())
    }

    async fn update_execution_progress(
        &self,
        _execution_id: ExecutionId,
        _progress: serde_json::Value,
    ) -> Result<(), PortsError> {
        Ok(())
    }

    async fn update_node_execution(
        &self,
        execution_id: ExecutionId,
        node_id: NodeId,
        node_execution: serde_json::Value,
    ) -> Result<(), PortsError> {
        tracing::debug!(%execution_id, %node_id, %node_execution, "node execution updated");
        Ok(())
    }

    async fn add_execution_log(&self, _execution_id: ExecutionId, _entry: serde_json::Value) -> Result<(), PortsError> {
        Ok(())
    }

    async fn set_execution_error(&self, _execution_id: ExecutionId, _error: serde_json::Value) -> Result<(), PortsError> {
        Ok(())
    }

    async fn set_execution_results(
        &self,
        _execution_id: ExecutionId,
        _results: serde_json::Value,
    ) -> Result<(), PortsError> {
        Ok(())
    }

    async fn get_running_executions(&self) -> Result<Vec<ExecutionId>, PortsError> {
        Ok(Vec::new())
    }

    async fn pause_execution(&self, _execution_id: ExecutionId) -> Result<(), PortsError> {
        Ok(())
    }

    async fn resume_execution(&self, _execution_id: ExecutionId) -> Result<(), PortsError> {
        Ok(())
    }

    async fn cancel_execution(&self, _execution_id: ExecutionId) -> Result<(), PortsError> {
        Ok(())
    }

    async fn has_permission(
        &self,
        _workflow_id: WorkflowId,
        _user_id: UserId,
        _permission: &str,
    ) -> Result<bool, PortsError> {
        Ok(true)
    }
}

/// Echoes a node's prepared input document back as its output.
///
/// Stands in for a real sandboxed program runner, which §1 explicitly
/// excludes from this crate's scope: this demo has no program catalog or
/// sandbox to dispatch into.
#[derive(Default)]
pub struct EchoRunner;

#[async_trait]
impl ProgramRunner for EchoRunner {
    async fn execute_project(&self, request: ProjectExecutionRequest) -> Result<ProjectExecutionResult, PortsError> {
        Ok(ProjectExecutionResult {
            success: true,
            execution_id: uuid::Uuid::new_v4().to_string(),
            exit_code: Some(0),
            output: request.parameters.to_string(),
            error_output: String::new(),
            duration: std::time::Duration::from_millis(1),
            output_files: Vec::new(),
            error_message: None,
        })
    }
}

/// Serves output files from a single base directory on disk.
pub struct LocalFileStorage {
    base_dir: PathBuf,
}

impl LocalFileStorage {
    /// Build a store rooted at `base_dir`.
    #[must_use]
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }
}

#[async_trait]
impl FileStorage for LocalFileStorage {
    async fn get_file_content(
        &self,
        _program_id: ProgramId,
        _version_ref: Option<ProgramVersionId>,
        path: &str,
    ) -> Result<Bytes, PortsError> {
        tokio::fs::read(self.base_dir.join(path))
            .await
            .map(Bytes::from)
            .map_err(|e| PortsError::Internal(e.to_string()))
    }

    async fn bulk_download_files(
        &self,
        _program_id: ProgramId,
        _version_ref: Option<ProgramVersionId>,
        _paths: &[String],
    ) -> Result<Bytes, PortsError> {
        Err(PortsError::Internal("bulk download is not implemented in this demo store".into()))
    }

    async fn create_execution_zip_archive(&self, _execution_id: ExecutionId) -> Result<Bytes, PortsError> {
        Err(PortsError::Internal("zip archiving is not implemented in this demo store".into()))
    }
}

/// In-memory store for `UIInteraction` records.
#[derive(Default)]
pub struct LocalInteractionRepository {
    interactions: Mutex<HashMap<InteractionId, serde_json::Value>>,
}

#[async_trait]
impl UiInteractionRepository for LocalInteractionRepository {
    async fn get_by_id(&self, id: InteractionId) -> Result<Option<serde_json::Value>, PortsError> {
        Ok(self.interactions.lock().unwrap().get(&id).cloned())
    }

    async fn create(&self, interaction: serde_json::Value) -> Result<(), PortsError> {
        let id: InteractionId = serde_json::from_value(interaction["id"].clone())?;
        self.interactions.lock().unwrap().insert(id, interaction);
        Ok(())
    }

    async fn update_status(
        &self,
        id: InteractionId,
        status: &str,
        output_data: Option<serde_json::Value>,
    ) -> Result<(), PortsError> {
        let mut interactions = self.interactions.lock().unwrap();
        if let Some(record) = interactions.get_mut(&id) {
            record["status"] = serde_json::json!(status);
            if let Some(data) = output_data {
                record["output_data"] = serde_json::json!(Some(data));
            }
        }
        Ok(())
    }

    async fn get_pending_for_user(&self, _user_id: UserId) -> Result<Vec<serde_json::Value>, PortsError> {
        Ok(Vec::new())
    }

    async fn get_by_workflow_execution(&self, _execution_id: ExecutionId) -> Result<Vec<serde_json::Value>, PortsError> {
        Ok(Vec::new())
    }

    async fn get_active_interactions(&self) -> Result<Vec<serde_json::Value>, PortsError> {
        Ok(Vec::new())
    }

    async fn get_timed_out_interactions(&self) -> Result<Vec<serde_json::Value>, PortsError> {
        Ok(Vec::new())
    }
}

/// Dispatches queued work onto a fresh `tokio::spawn`'d task, matching the
/// fresh-scope contract §4.5/§9 describe for the background continuation
/// protocol (the work item gets its own cancellation token, not the
/// triggering request's).
#[derive(Default)]
pub struct TokioBackgroundQueue;

#[async_trait]
impl BackgroundQueue for TokioBackgroundQueue {
    async fn queue_background_work_item(&self, item: BackgroundWorkItem) -> Result<(), PortsError> {
        tokio::spawn(async move {
            item(CancellationToken::new()).await;
        });
        Ok(())
    }
}
