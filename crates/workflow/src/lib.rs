#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Workflow definition, dependency graph, and structural validation.
//!
//! A [`Workflow`] is a named, versioned DAG of [`Node`]s connected by
//! [`Edge`]s. This crate owns the definition's data model and the
//! structural checks ([`Validator`]) run before an execution can start;
//! it has no notion of a running execution, which lives in the execution
//! crate built on top of it.

pub mod definition;
pub mod error;
pub mod graph;
pub mod validator;

pub use definition::{
    Edge, EdgeKind, ExecutionSettings, InputConfiguration, InputMapping, Node, OutputConfiguration,
    OutputMapping, StaticInputs, UserInputDeclaration, Workflow, WorkflowConfig,
};
pub use error::WorkflowError;
pub use graph::DependencyGraph;
pub use validator::{ComplexityMetrics, Finding, ValidationResult, Validator};
