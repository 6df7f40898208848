//! Background queue port.
//!
//! The scheduler's background-continuation protocol (§4.5, §9)
//! must not reuse the resource scope of the request that triggered it. This
//! port is the seam: a work item is a boxed closure that receives its own
//! cancellation token and returns an owned future, so the queue can run it
//! on a fresh task with its own cloned handles rather than borrowing from
//! the originating call stack.

use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;
use tokio_util::sync::CancellationToken;

use crate::error::PortsError;

/// An owned, boxed unit of background work.
pub type BackgroundWorkItem =
    Box<dyn FnOnce(CancellationToken) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send>;

/// Port trait for dispatching background continuations.
#[async_trait]
pub trait BackgroundQueue: Send + Sync {
    /// Enqueue a work item for execution on a fresh scope.
    async fn queue_background_work_item(
        &self,
        item: BackgroundWorkItem,
    ) -> Result<(), PortsError>;
}
