//! Notification sink port.
//!
//! Fire-and-forget notifications to whatever push-notification subsystem a
//! deployment runs. `flux-eventbus` ships a broadcast-based default
//! implementation; this trait is the seam so a deployment can swap in
//! websockets, webhooks, or anything else without touching the engine.

use async_trait::async_trait;
use flux_core::{ExecutionId, InteractionId, NodeId};

use crate::error::PortsError;

/// Port trait for pushing UI-interaction lifecycle notifications.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// A new interaction was created and a node is now waiting for input.
    async fn notify_ui_interaction_created(
        &self,
        execution_id: ExecutionId,
        node_id: NodeId,
        interaction_id: InteractionId,
    ) -> Result<(), PortsError>;

    /// An interaction's status changed (Completed, Cancelled, or Timeout).
    async fn notify_ui_interaction_status_changed(
        &self,
        interaction_id: InteractionId,
        status: &str,
    ) -> Result<(), PortsError>;

    /// An interaction is available to be acted on by a specific user.
    async fn notify_ui_interaction_available(
        &self,
        interaction_id: InteractionId,
        user_id: flux_core::UserId,
    ) -> Result<(), PortsError>;
}
