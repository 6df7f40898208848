#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Flux Execution
//!
//! Runtime execution records, state machines, and planning for the workflow
//! engine. This crate models execution-time concepts; it does not contain
//! the engine orchestrator (flux-engine), which owns scheduling, the
//! session registry, and collaborator ports.
//!
//! - [`WorkflowStatus`] / [`NodeStatus`] — the two state machines (§3)
//! - [`WorkflowExecution`] and [`NodeExecution`] — persisted state tracking
//! - [`ExecutionPlan`] — the pre-computed parallel execution schedule
//! - [`ExecutionContext`] — the persisted per-execution inputs and limits
//! - [`Progress`] and [`Results`] — the rolling and final execution summaries
//! - [`RunnerOutcome`] and [`apply_output_mappings`] — node output processing
//! - [`NodeErrorKind`], [`ErrorDescriptor`], [`WorkflowErrorKind`],
//!   [`WorkflowErrorDescriptor`] — the per-node and per-workflow error taxonomy
//! - [`transition`] — the transition-validity rules backing both state machines

pub mod context;
pub mod error;
pub mod node_status;
pub mod output;
pub mod plan;
pub mod progress;
pub mod results;
pub mod state;
pub mod status;
pub mod transition;

pub use context::ExecutionContext;
pub use error::{ErrorDescriptor, ExecutionError, NodeErrorKind, WorkflowErrorDescriptor, WorkflowErrorKind};
pub use node_status::NodeStatus;
pub use output::{apply_output_mappings, NodeOutputFile, RunnerOutcome, WorkflowDataContract};
pub use plan::ExecutionPlan;
pub use progress::Progress;
pub use results::Results;
pub use state::{NodeExecution, WorkflowExecution};
pub use status::WorkflowStatus;
pub use transition::{
    can_transition_node, can_transition_workflow, validate_node_transition, validate_workflow_transition,
};
