//! In-memory fakes for the six collaborator ports, shared by this crate's
//! scenario tests. Each fake stores just enough state to observe what the
//! scheduler and facade did; none of them talk to a real backend.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use flux_core::{ExecutionId, InteractionId, NodeId, ProgramId, ProgramVersionId, UserId, WorkflowId};
use flux_ports::{
    BackgroundQueue, BackgroundWorkItem, FileStorage, NotificationSink, PortsError, ProgramRunner,
    ProjectExecutionRequest, ProjectExecutionResult, UiInteractionRepository, WorkflowRepository,
};
use flux_workflow::Workflow;
use tokio_util::sync::CancellationToken;

/// Holds workflow definitions and swallows every execution-record write.
/// Permission checks always succeed; this fake models no authorization.
#[derive(Default)]
pub struct InMemoryRepository {
    workflows: Mutex<HashMap<WorkflowId, Workflow>>,
}

impl InMemoryRepository {
    pub fn with_workflow(workflow: Workflow) -> Self {
        let mut workflows = HashMap::new();
        workflows.insert(workflow.id, workflow);
        Self {
            workflows: Mutex::new(workflows),
        }
    }
}

#[async_trait]
impl WorkflowRepository for InMemoryRepository {
    async fn get_by_id(&self, id: WorkflowId) -> Result<Option<serde_json::Value>, PortsError> {
        let workflows = self.workflows.lock().unwrap();
        Ok(workflows.get(&id).map(|w| serde_json::to_value(w).unwrap()))
    }

    async fn update_execution_status(
        &self,
        _execution_id: ExecutionId,
        _status: serde_json::Value,
    ) -> Result<(), PortsError> {
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
        _execution_id: ExecutionId,
        _node_id: NodeId,
        _node_execution: serde_json::Value,
    ) -> Result<(), PortsError> {
        Ok(())
    }

    async fn add_execution_log(
        &self,
        _execution_id: ExecutionId,
        _entry: serde_json::Value,
    ) -> Result<(), PortsError> {
        Ok(())
    }

    async fn set_execution_error(
        &self,
        _execution_id: ExecutionId,
        _error: serde_json::Value,
    ) -> Result<(), PortsError> {
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

/// Scripted program runner: each program id gets its own queue of results,
/// returned in order, one per call. Defaults to a successful empty result
/// when a program's queue is exhausted, so tests only need to script the
/// behavior they care about.
#[derive(Default)]
pub struct ScriptedRunner {
    results: Mutex<HashMap<ProgramId, VecDeque<ProjectExecutionResult>>>,
    pub calls: Mutex<Vec<ProgramId>>,
    /// Every request handed to `execute_project`, in call order, kept
    /// alongside `calls` so tests can inspect the environment and parameters
    /// a particular invocation ran with.
    pub requests: Mutex<Vec<ProjectExecutionRequest>>,
}

impl ScriptedRunner {
    pub fn push(&self, program_id: ProgramId, result: ProjectExecutionResult) {
        self.results
            .lock()
            .unwrap()
            .entry(program_id)
            .or_default()
            .push_back(result);
    }
}

pub fn success_result(output: serde_json::Value) -> ProjectExecutionResult {
    ProjectExecutionResult {
        success: true,
        execution_id: "runner-1".into(),
        exit_code: Some(0),
        output: output.to_string(),
        error_output: String::new(),
        duration: std::time::Duration::from_millis(1),
        output_files: Vec::new(),
        error_message: None,
    }
}

pub fn failure_result(message: &str) -> ProjectExecutionResult {
    ProjectExecutionResult {
        success: false,
        execution_id: "runner-1".into(),
        exit_code: Some(1),
        output: String::new(),
        error_output: message.into(),
        duration: std::time::Duration::from_millis(1),
        output_files: Vec::new(),
        error_message: Some(message.into()),
    }
}

#[async_trait]
impl ProgramRunner for ScriptedRunner {
    async fn execute_project(
        &self,
        request: ProjectExecutionRequest,
    ) -> Result<ProjectExecutionResult, PortsError> {
        self.calls.lock().unwrap().push(request.program_id);
        self.requests.lock().unwrap().push(request.clone());
        let mut results = self.results.lock().unwrap();
        let queue = results.entry(request.program_id).or_default();
        Ok(queue.pop_front().unwrap_or_else(|| success_result(serde_json::json!({}))))
    }
}

/// No-op file storage; none of the scenario tests exercise file download.
#[derive(Default)]
pub struct NullFileStorage;

#[async_trait]
impl FileStorage for NullFileStorage {
    async fn get_file_content(
        &self,
        _program_id: ProgramId,
        _version_ref: Option<ProgramVersionId>,
        _path: &str,
    ) -> Result<Bytes, PortsError> {
        Ok(Bytes::new())
    }

    async fn bulk_download_files(
        &self,
        _program_id: ProgramId,
        _version_ref: Option<ProgramVersionId>,
        _paths: &[String],
    ) -> Result<Bytes, PortsError> {
        Ok(Bytes::new())
    }

    async fn create_execution_zip_archive(&self, _execution_id: ExecutionId) -> Result<Bytes, PortsError> {
        Ok(Bytes::new())
    }
}

/// In-memory UI interaction store, enough for suspend/resume round trips.
#[derive(Default)]
pub struct InMemoryInteractions {
    interactions: Mutex<HashMap<InteractionId, serde_json::Value>>,
}

impl InMemoryInteractions {
    /// The id of the single interaction created so far, for tests that
    /// suspend exactly one node and need to drive its resume.
    pub fn only_interaction_id(&self) -> InteractionId {
        let interactions = self.interactions.lock().unwrap();
        assert_eq!(interactions.len(), 1, "expected exactly one interaction");
        *interactions.keys().next().unwrap()
    }
}

#[async_trait]
impl UiInteractionRepository for InMemoryInteractions {
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

    async fn get_by_workflow_execution(
        &self,
        _execution_id: ExecutionId,
    ) -> Result<Vec<serde_json::Value>, PortsError> {
        Ok(Vec::new())
    }

    async fn get_active_interactions(&self) -> Result<Vec<serde_json::Value>, PortsError> {
        Ok(Vec::new())
    }

    async fn get_timed_out_interactions(&self) -> Result<Vec<serde_json::Value>, PortsError> {
        Ok(Vec::new())
    }
}

/// Swallows every notification; scenario tests assert on execution state, not
/// on what would have been pushed to a client.
#[derive(Default)]
pub struct NullNotifier;

#[async_trait]
impl NotificationSink for NullNotifier {
    async fn notify_ui_interaction_created(
        &self,
        _execution_id: ExecutionId,
        _node_id: NodeId,
        _interaction_id: InteractionId,
    ) -> Result<(), PortsError> {
        Ok(())
    }

    async fn notify_ui_interaction_status_changed(
        &self,
        _interaction_id: InteractionId,
        _status: &str,
    ) -> Result<(), PortsError> {
        Ok(())
    }

    async fn notify_ui_interaction_available(
        &self,
        _interaction_id: InteractionId,
        _user_id: UserId,
    ) -> Result<(), PortsError> {
        Ok(())
    }
}

/// Runs a queued work item inline, on the caller's own task, instead of
/// actually backgrounding it. Makes `EngineFacade::execute` deterministic to
/// test: by the time it returns, the whole run (or the part of it that
/// doesn't suspend on a UI interaction) has already happened.
#[derive(Default)]
pub struct InlineQueue;

#[async_trait]
impl BackgroundQueue for InlineQueue {
    async fn queue_background_work_item(&self, item: BackgroundWorkItem) -> Result<(), PortsError> {
        item(CancellationToken::new()).await;
        Ok(())
    }
}
