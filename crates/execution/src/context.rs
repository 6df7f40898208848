//! The persisted per-execution context (§3).
//!
//! Distinct from the engine's runtime session (flux-engine), which wraps
//! this context with `Arc`-shared, non-serializable resources like the
//! cancellation source. This type is exactly what `WorkflowExecution`
//! persists and what `ValidateExecution` (§4.1) checks against the
//! workflow's declared user inputs.

use std::collections::HashMap;

use flux_core::Document;
use flux_workflow::Workflow;
use serde::{Deserialize, Serialize};

use crate::error::ExecutionError;

/// Per-execution tuning and caller-supplied inputs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExecutionContext {
    /// User-supplied input values, keyed `"{nodeId}.{inputName}"`.
    pub user_inputs: HashMap<String, Document>,
    /// Maximum nodes this execution may run concurrently.
    pub max_concurrent_nodes: usize,
    /// Wall-clock timeout for the whole execution, in minutes.
    pub timeout_minutes: u32,
    /// Caller-supplied metadata, carried through unchanged.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl ExecutionContext {
    /// Build a key of the form `"{node_id}.{input_name}"` used to address
    /// `user_inputs`.
    #[must_use]
    pub fn input_key(node_id: impl std::fmt::Display, input_name: &str) -> String {
        format!("{node_id}.{input_name}")
    }

    /// Look up a user input by node id and declared name.
    #[must_use]
    pub fn user_input(&self, node_id: impl std::fmt::Display, input_name: &str) -> Option<&Document> {
        self.user_inputs.get(&Self::input_key(node_id, input_name))
    }

    /// `ValidateExecution` (§4.1): every required user input `workflow`
    /// declares must have a non-null value here, and the concurrency/timeout
    /// limits must be positive. Unlike the Validator's structural checks,
    /// this runs against an actual `ExecutionContext` and fails admission
    /// outright rather than producing a warning.
    pub fn validate_against(&self, workflow: &Workflow) -> Result<(), ExecutionError> {
        if self.max_concurrent_nodes == 0 {
            return Err(ExecutionError::InvalidLimits("max_concurrent_nodes must be > 0".into()));
        }
        if self.timeout_minutes == 0 {
            return Err(ExecutionError::InvalidLimits("timeout_minutes must be > 0".into()));
        }

        for node in workflow.enabled_nodes() {
            for declared in &node.inputs.user_inputs {
                if !declared.required || declared.default.is_some() {
                    continue;
                }
                let provided = self.user_input(node.id, &declared.name);
                if !matches!(provided, Some(value) if !value.is_null()) {
                    return Err(ExecutionError::MissingUserInput {
                        node: node.id,
                        input_name: declared.name.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self {
            user_inputs: HashMap::new(),
            max_concurrent_nodes: 10,
            timeout_minutes: 60,
            metadata: HashMap::new(),
        }
    }
}
