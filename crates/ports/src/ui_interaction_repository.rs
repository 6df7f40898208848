//! UI interaction repository port.
//!
//! `UIInteraction` records are stored independently of the execution
//! document, keyed by their own id, and referenced by execution id
//! (§6's persisted-state layout).

use async_trait::async_trait;
use flux_core::{ExecutionId, InteractionId, UserId};

use crate::error::PortsError;

/// Persistence interface for `UIInteraction` records.
#[async_trait]
pub trait UiInteractionRepository: Send + Sync {
    /// Fetch one interaction by id.
    async fn get_by_id(
        &self,
        id: InteractionId,
    ) -> Result<Option<serde_json::Value>, PortsError>;

    /// Persist a newly created interaction.
    async fn create(&self, interaction: serde_json::Value) -> Result<(), PortsError>;

    /// Update an interaction's status and, when completing, its output data.
    async fn update_status(
        &self,
        id: InteractionId,
        status: &str,
        output_data: Option<serde_json::Value>,
    ) -> Result<(), PortsError>;

    /// List interactions awaiting a given user's input.
    async fn get_pending_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<serde_json::Value>, PortsError>;

    /// List every interaction created for a given execution.
    async fn get_by_workflow_execution(
        &self,
        execution_id: ExecutionId,
    ) -> Result<Vec<serde_json::Value>, PortsError>;

    /// List interactions currently Pending or InProgress, across all executions.
    async fn get_active_interactions(&self) -> Result<Vec<serde_json::Value>, PortsError>;

    /// List interactions whose timeout has elapsed but are not yet marked Timeout.
    ///
    /// Used by the background timeout sweep (§4.5).
    async fn get_timed_out_interactions(&self) -> Result<Vec<serde_json::Value>, PortsError>;
}
