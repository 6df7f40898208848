//! Workflow repository port.
//!
//! Persistence interface for workflow definitions and the durable execution
//! record. The engine never reads or writes a concrete store directly; it
//! only ever holds an `Arc<dyn WorkflowRepository>`, so unit tests can swap in
//! an in-memory driver and a production deployment can swap in whatever
//! document store it already runs.

use async_trait::async_trait;
use flux_core::{ExecutionId, WorkflowId};

use crate::error::PortsError;

/// Persistence interface for workflow definitions and execution records.
///
/// Execution-record fields (`status`, `progress`, logs, error, results) are
/// passed as `serde_json::Value` rather than concrete types: this crate sits
/// below the execution data model in the dependency order, so it treats
/// those payloads as opaque documents that the caller (`flux-engine`)
/// serializes and deserializes.
#[async_trait]
pub trait WorkflowRepository: Send + Sync {
    /// Fetch a workflow definition by id.
    async fn get_by_id(&self, id: WorkflowId) -> Result<Option<serde_json::Value>, PortsError>;

    /// Overwrite the execution's top-level status.
    async fn update_execution_status(
        &self,
        execution_id: ExecutionId,
        status: serde_json::Value,
    ) -> Result<(), PortsError>;

    /// Overwrite the execution's progress summary.
    async fn update_execution_progress(
        &self,
        execution_id: ExecutionId,
        progress: serde_json::Value,
    ) -> Result<(), PortsError>;

    /// Upsert a single node's execution record within an execution.
    async fn update_node_execution(
        &self,
        execution_id: ExecutionId,
        node_id: flux_core::NodeId,
        node_execution: serde_json::Value,
    ) -> Result<(), PortsError>;

    /// Append one entry to the execution's log stream.
    async fn add_execution_log(
        &self,
        execution_id: ExecutionId,
        entry: serde_json::Value,
    ) -> Result<(), PortsError>;

    /// Record the execution's top-level error descriptor.
    async fn set_execution_error(
        &self,
        execution_id: ExecutionId,
        error: serde_json::Value,
    ) -> Result<(), PortsError>;

    /// Record the execution's final `Results` document.
    async fn set_execution_results(
        &self,
        execution_id: ExecutionId,
        results: serde_json::Value,
    ) -> Result<(), PortsError>;

    /// List execution ids currently in a live (non-terminal) status.
    async fn get_running_executions(&self) -> Result<Vec<ExecutionId>, PortsError>;

    /// Mark an execution Paused.
    async fn pause_execution(&self, execution_id: ExecutionId) -> Result<(), PortsError>;

    /// Mark a Paused execution Running again.
    async fn resume_execution(&self, execution_id: ExecutionId) -> Result<(), PortsError>;

    /// Mark an execution Cancelled.
    async fn cancel_execution(&self, execution_id: ExecutionId) -> Result<(), PortsError>;

    /// Check whether `user_id` holds at least `permission` on `workflow_id`.
    async fn has_permission(
        &self,
        workflow_id: WorkflowId,
        user_id: flux_core::UserId,
        permission: &str,
    ) -> Result<bool, PortsError>;
}
