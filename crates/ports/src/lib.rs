#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! External collaborator interfaces (ports) for the workflow execution engine.
//!
//! This crate defines the port traits that the engine depends on but never
//! implements: [`WorkflowRepository`], [`ProgramRunner`], [`FileStorage`],
//! [`UiInteractionRepository`], [`NotificationSink`], [`BackgroundQueue`].
//! Every trait is `async_trait` and object-safe, so drivers can be supplied
//! as `Arc<dyn Trait>` behind dependency injection.

pub mod background_queue;
pub mod error;
pub mod file_storage;
pub mod notification_sink;
pub mod program_runner;
pub mod ui_interaction_repository;
pub mod workflow_repository;

pub use background_queue::{BackgroundQueue, BackgroundWorkItem};
pub use error::PortsError;
pub use file_storage::FileStorage;
pub use notification_sink::NotificationSink;
pub use program_runner::{OutputFileRef, ProgramRunner, ProjectExecutionRequest, ProjectExecutionResult, ResourceLimits};
pub use ui_interaction_repository::UiInteractionRepository;
pub use workflow_repository::WorkflowRepository;
