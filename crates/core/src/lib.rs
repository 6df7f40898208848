#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Identifiers and shared primitives for the workflow execution engine.
//!
//! This crate has no logic of its own; it exists so that `flux-workflow`,
//! `flux-execution`, `flux-ports`, and `flux-engine` share one definition of
//! "what a node id is" instead of each rolling a `Uuid` newtype.

pub mod document;
pub mod id;

pub use document::{empty_document, Document};
pub use id::{
    ExecutionId, InteractionId, NodeId, ProgramId, ProgramVersionId, UserId, UuidParseError,
    WorkflowId,
};

/// Re-exported so downstream crates pin one `semver` version for workflow
/// version fields without depending on the crate directly.
pub use semver::Version;
