//! The UI Interaction Bridge: suspends a node awaiting human input, resumes it
//! when that input arrives, and sweeps expired interactions (§4.5).

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use flux_core::{Document, ExecutionId, InteractionId, NodeId, UserId};
use flux_ports::{NotificationSink, PortsError, UiInteractionRepository};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// UI surfaces a node's `ui_type` can declare that never make it interactive,
/// regardless of whether a `ui_schema` is attached.
pub const NON_INTERACTIVE_UI_TYPES: &[&str] = &["console", "none", "cli", "batch", "service"];

/// Whether a node with the given `ui_type` and schema presence counts as
/// interactive.
#[must_use]
pub fn is_interactive(ui_type: &str, has_schema: bool) -> bool {
    has_schema && !NON_INTERACTIVE_UI_TYPES.contains(&ui_type)
}

/// A UI interaction's lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionStatus {
    /// Created, not yet acted on.
    Pending,
    /// A user has opened it but not submitted a result.
    InProgress,
    /// A user submitted output; the owning node resumed.
    Completed,
    /// The owning execution was cancelled before the interaction resolved.
    Cancelled,
    /// No input arrived within the configured timeout.
    Timeout,
}

impl InteractionStatus {
    /// Human-readable, lower-case form used in notifications and logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Timeout => "timeout",
        }
    }

    fn is_actionable(self) -> bool {
        matches!(self, Self::Pending | Self::InProgress)
    }
}

/// A single pending (or resolved) UI interaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiInteraction {
    /// Identity.
    pub id: InteractionId,
    /// The execution this interaction belongs to.
    pub execution_id: ExecutionId,
    /// The node waiting on this interaction.
    pub node_id: NodeId,
    /// Current lifecycle status.
    pub status: InteractionStatus,
    /// The program's declared UI input schema, shown to the acting user.
    pub input_schema: Document,
    /// The submitted result, once `Completed`.
    pub output_data: Option<Document>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// How long after `created_at` this interaction is considered expired.
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// When the interaction left `Pending`/`InProgress`, if it has.
    pub completed_at: Option<DateTime<Utc>>,
}

impl UiInteraction {
    /// Create a new, pending interaction.
    #[must_use]
    pub fn new(
        execution_id: ExecutionId,
        node_id: NodeId,
        input_schema: Document,
        timeout: Duration,
    ) -> Self {
        Self {
            id: InteractionId::v4(),
            execution_id,
            node_id,
            status: InteractionStatus::Pending,
            input_schema,
            output_data: None,
            created_at: Utc::now(),
            timeout,
            completed_at: None,
        }
    }

    /// Whether `now` is past this interaction's deadline.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        let elapsed = now.signed_duration_since(self.created_at);
        elapsed
            .to_std()
            .map(|elapsed| elapsed >= self.timeout)
            .unwrap_or(false)
    }
}

/// Pass `output_data` through unchanged.
///
/// `Document` is already `serde_json::Value`, so every JSON-representable
/// shape a UI component can submit is already in normal form; there is no
/// distinct wire representation left to convert out of.
#[must_use]
pub fn normalize_output_data(value: Document) -> Document {
    value
}

/// Errors the bridge surfaces resuming or sweeping interactions.
#[derive(Debug, Error)]
pub enum InteractionError {
    /// No interaction exists with the given id.
    #[error("interaction {0} not found")]
    NotFound(InteractionId),
    /// The interaction is not in a state that can be acted on.
    #[error("interaction {0} is not actionable (status: {1})")]
    NotActionable(InteractionId, &'static str),
    /// The interaction's timeout elapsed before it was acted on.
    #[error("interaction {0} timed out")]
    Expired(InteractionId),
    /// A collaborator port failed.
    #[error(transparent)]
    Ports(#[from] PortsError),
}

impl InteractionError {
    /// Stable machine-readable error code.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "interaction_not_found",
            Self::NotActionable(..) => "interaction_not_actionable",
            Self::Expired(_) => "interaction_expired",
            Self::Ports(PortsError::NotFound { .. }) => "not_found",
            Self::Ports(PortsError::Conflict { .. }) => "conflict",
            Self::Ports(PortsError::Connection(_)) => "connection_error",
            Self::Ports(PortsError::Serialization(_)) => "serialization_error",
            Self::Ports(PortsError::Timeout { .. }) => "timeout",
            Self::Ports(PortsError::Internal(_)) => "internal_error",
        }
    }

    /// Whether retrying the call that produced this error might succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Ports(e) if e.is_retryable())
    }
}

/// Suspends and resumes interactive nodes via the `UiInteractionRepository`
/// and `NotificationSink` ports.
pub struct InteractionBridge {
    repo: Arc<dyn UiInteractionRepository>,
    notifier: Arc<dyn NotificationSink>,
    default_timeout: Duration,
}

impl InteractionBridge {
    /// Build a bridge with the given default interaction timeout.
    #[must_use]
    pub fn new(
        repo: Arc<dyn UiInteractionRepository>,
        notifier: Arc<dyn NotificationSink>,
        default_timeout: Duration,
    ) -> Self {
        Self {
            repo,
            notifier,
            default_timeout,
        }
    }

    /// Create a pending interaction for `node_id` and notify its creation.
    pub async fn suspend(
        &self,
        execution_id: ExecutionId,
        node_id: NodeId,
        input_schema: Document,
    ) -> Result<UiInteraction, InteractionError> {
        let interaction =
            UiInteraction::new(execution_id, node_id, input_schema, self.default_timeout);
        self.repo
            .create(serde_json::to_value(&interaction).unwrap_or_default())
            .await?;
        self.notifier
            .notify_ui_interaction_created(execution_id, node_id, interaction.id)
            .await?;
        Ok(interaction)
    }

    /// Resolve a pending interaction with user-submitted output.
    ///
    /// Rejects an already-resolved interaction, and converts an expired one
    /// into a persisted `Timeout` before reporting it as expired, rather than
    /// completing it late.
    pub async fn resume(
        &self,
        interaction_id: InteractionId,
        output_data: Document,
    ) -> Result<UiInteraction, InteractionError> {
        let record = self
            .repo
            .get_by_id(interaction_id)
            .await?
            .ok_or(InteractionError::NotFound(interaction_id))?;
        let mut interaction: UiInteraction =
            serde_json::from_value(record).map_err(|e| InteractionError::Ports(e.into()))?;

        if !interaction.status.is_actionable() {
            return Err(InteractionError::NotActionable(
                interaction_id,
                interaction.status.as_str(),
            ));
        }

        if interaction.is_expired(Utc::now()) {
            interaction.status = InteractionStatus::Timeout;
            interaction.completed_at = Some(Utc::now());
            self.repo
                .update_status(interaction_id, InteractionStatus::Timeout.as_str(), None)
                .await?;
            self.notifier
                .notify_ui_interaction_status_changed(
                    interaction_id,
                    InteractionStatus::Timeout.as_str(),
                )
                .await?;
            return Err(InteractionError::Expired(interaction_id));
        }

        let normalized = normalize_output_data(output_data);
        interaction.status = InteractionStatus::Completed;
        interaction.output_data = Some(normalized.clone());
        interaction.completed_at = Some(Utc::now());
        self.repo
            .update_status(
                interaction_id,
                InteractionStatus::Completed.as_str(),
                Some(normalized),
            )
            .await?;
        self.notifier
            .notify_ui_interaction_status_changed(
                interaction_id,
                InteractionStatus::Completed.as_str(),
            )
            .await?;
        Ok(interaction)
    }

    /// Mark every currently-timed-out interaction as `Timeout` and notify.
    ///
    /// Runs on a background sweep interval (`EngineConfig::timeout_sweep_interval`);
    /// a node already `WaitingForInput` whose interaction times out here is
    /// left for the scheduler to fail on its own next pass rather than this
    /// bridge reaching back into execution state.
    pub async fn sweep_timeouts(&self) -> Result<Vec<InteractionId>, PortsError> {
        let mut timed_out = Vec::new();
        for record in self.repo.get_timed_out_interactions().await? {
            let Ok(interaction) = serde_json::from_value::<UiInteraction>(record) else {
                continue;
            };
            if !interaction.status.is_actionable() {
                continue;
            }
            self.repo
                .update_status(interaction.id, InteractionStatus::Timeout.as_str(), None)
                .await?;
            self.notifier
                .notify_ui_interaction_status_changed(
                    interaction.id,
                    InteractionStatus::Timeout.as_str(),
                )
                .await?;
            timed_out.push(interaction.id);
        }
        Ok(timed_out)
    }
}
