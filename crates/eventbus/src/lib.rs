#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Broadcast-based execution lifecycle events and the default
//! [`NotificationSink`](flux_ports::NotificationSink) implementation.
//!
//! Events are fire-and-forget projections, not the source of truth — the
//! persisted [`flux_execution::WorkflowExecution`] record is authoritative.
//! A deployment with no subscribers loses nothing by dropping events.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use flux_core::{ExecutionId, InteractionId, NodeId, UserId};
use flux_ports::{NotificationSink, PortsError};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

/// An execution or UI-interaction lifecycle event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ExecutionEvent {
    /// An execution has started.
    Started {
        /// The execution identifier.
        execution_id: ExecutionId,
    },
    /// A node within an execution has started.
    NodeStarted {
        /// The execution identifier.
        execution_id: ExecutionId,
        /// The node identifier.
        node_id: NodeId,
    },
    /// A node within an execution has completed.
    NodeCompleted {
        /// The execution identifier.
        execution_id: ExecutionId,
        /// The node identifier.
        node_id: NodeId,
    },
    /// A node within an execution has failed.
    NodeFailed {
        /// The execution identifier.
        execution_id: ExecutionId,
        /// The node identifier.
        node_id: NodeId,
    },
    /// An execution has completed successfully.
    Completed {
        /// The execution identifier.
        execution_id: ExecutionId,
    },
    /// An execution has failed.
    Failed {
        /// The execution identifier.
        execution_id: ExecutionId,
    },
    /// A new UI interaction was created and a node is now waiting on input.
    UiInteractionCreated {
        /// The execution identifier.
        execution_id: ExecutionId,
        /// The node identifier.
        node_id: NodeId,
        /// The interaction identifier.
        interaction_id: InteractionId,
    },
    /// A UI interaction's status changed.
    UiInteractionStatusChanged {
        /// The interaction identifier.
        interaction_id: InteractionId,
        /// The new status, as reported by the caller.
        status: String,
    },
    /// A UI interaction became available for a specific user to act on.
    UiInteractionAvailable {
        /// The interaction identifier.
        interaction_id: InteractionId,
        /// The user the interaction is available to.
        user_id: UserId,
    },
}

/// Broadcast-based event bus.
///
/// Delivers events to all active subscribers; if none are listening,
/// events are silently dropped. Also implements
/// [`NotificationSink`](flux_ports::NotificationSink), so it can be wired
/// directly into the engine facade as the default notification collaborator.
pub struct EventBus {
    sender: broadcast::Sender<ExecutionEvent>,
    emitted: AtomicU64,
}

impl EventBus {
    /// Create a new event bus with the given channel capacity.
    ///
    /// When the channel is full, the oldest events are dropped; lagging
    /// subscribers observe a gap rather than blocking the emitter.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            emitted: AtomicU64::new(0),
        }
    }

    /// Emit an event to all subscribers.
    pub fn emit(&self, event: ExecutionEvent) {
        self.emitted.fetch_add(1, Ordering::Relaxed);
        let _ = self.sender.send(event);
    }

    /// Subscribe to events.
    #[must_use]
    pub fn subscribe(&self) -> EventSubscriber {
        EventSubscriber {
            receiver: self.sender.subscribe(),
        }
    }

    /// Total number of events emitted since creation.
    #[must_use]
    pub fn total_emitted(&self) -> u64 {
        self.emitted.load(Ordering::Relaxed)
    }

    /// Number of active subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

/// Subscription handle for receiving events from an [`EventBus`].
pub struct EventSubscriber {
    receiver: broadcast::Receiver<ExecutionEvent>,
}

impl EventSubscriber {
    /// Receive the next event, waiting asynchronously.
    ///
    /// Returns `None` once the bus has been dropped. A lagged subscriber
    /// silently skips ahead rather than surfacing the gap as an error.
    pub async fn recv(&mut self) -> Option<ExecutionEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Try to receive an event without blocking.
    pub fn try_recv(&mut self) -> Option<ExecutionEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }

    /// Convert into a [`futures_core::Stream`] of events, for callers that
    /// prefer stream combinators over manual polling.
    #[must_use]
    pub fn into_stream(self) -> BroadcastStream<ExecutionEvent> {
        BroadcastStream::new(self.receiver)
    }
}

#[async_trait]
impl NotificationSink for EventBus {
    async fn notify_ui_interaction_created(
        &self,
        execution_id: ExecutionId,
        node_id: NodeId,
        interaction_id: InteractionId,
    ) -> Result<(), PortsError> {
        self.emit(ExecutionEvent::UiInteractionCreated {
            execution_id,
            node_id,
            interaction_id,
        });
        Ok(())
    }

    async fn notify_ui_interaction_status_changed(
        &self,
        interaction_id: InteractionId,
        status: &str,
    ) -> Result<(), PortsError> {
        self.emit(ExecutionEvent::UiInteractionStatusChanged {
            interaction_id,
            status: status.to_string(),
        });
        Ok(())
    }

    async fn notify_ui_interaction_available(
        &self,
        interaction_id: InteractionId,
        user_id: UserId,
    ) -> Result<(), PortsError> {
        self.emit(ExecutionEvent::UiInteractionAvailable {
            interaction_id,
            user_id,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emit_without_subscribers_does_not_panic() {
        let bus = EventBus::new(16);
        bus.emit(ExecutionEvent::Started {
            execution_id: ExecutionId::v4(),
        });
        assert_eq!(bus.total_emitted(), 1);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn subscriber_receives_via_try_recv() {
        let bus = EventBus::new(16);
        let mut sub = bus.subscribe();
        let id = ExecutionId::v4();

        bus.emit(ExecutionEvent::Completed { execution_id: id });

        let event = sub.try_recv().expect("should receive event");
        assert_eq!(event, ExecutionEvent::Completed { execution_id: id });
    }

    #[tokio::test]
    async fn subscriber_receives_via_recv() {
        let bus = EventBus::new(16);
        let mut sub = bus.subscribe();
        let id = ExecutionId::v4();
        let node = NodeId::v4();

        bus.emit(ExecutionEvent::NodeStarted {
            execution_id: id,
            node_id: node,
        });

        let event = sub.recv().await.expect("should receive event");
        match event {
            ExecutionEvent::NodeStarted { execution_id, node_id } => {
                assert_eq!(execution_id, id);
                assert_eq!(node_id, node);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn multiple_subscribers_each_get_a_copy() {
        let bus = EventBus::new(16);
        let mut sub1 = bus.subscribe();
        let mut sub2 = bus.subscribe();

        bus.emit(ExecutionEvent::Started {
            execution_id: ExecutionId::v4(),
        });

        assert!(sub1.try_recv().is_some());
        assert!(sub2.try_recv().is_some());
    }

    #[test]
    fn subscriber_count_tracks_active_subscriptions() {
        let bus = EventBus::new(16);
        assert_eq!(bus.subscriber_count(), 0);

        let sub1 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        let _sub2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        drop(sub1);
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn notification_sink_impl_emits_events() {
        let bus = EventBus::new(16);
        let mut sub = bus.subscribe();
        let interaction = InteractionId::v4();

        NotificationSink::notify_ui_interaction_status_changed(&bus, interaction, "Completed")
            .await
            .unwrap();

        let event = sub.recv().await.unwrap();
        assert_eq!(
            event,
            ExecutionEvent::UiInteractionStatusChanged {
                interaction_id: interaction,
                status: "Completed".into(),
            }
        );
    }

    #[test]
    fn execution_event_serialization_roundtrip() {
        let events = vec![
            ExecutionEvent::Started {
                execution_id: ExecutionId::v4(),
            },
            ExecutionEvent::Failed {
                execution_id: ExecutionId::v4(),
            },
            ExecutionEvent::UiInteractionAvailable {
                interaction_id: InteractionId::v4(),
                user_id: UserId::v4(),
            },
        ];

        for event in events {
            let json = serde_json::to_string(&event).expect("serialize");
            let roundtrip: ExecutionEvent = serde_json::from_str(&json).expect("deserialize");
            assert_eq!(event, roundtrip);
        }
    }
}
