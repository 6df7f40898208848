//! Node output processing (§4.4, §6).
//!
//! [`RunnerOutcome`] is the materialized result of one program-runner
//! invocation. [`OutputMapping`]s from the node's [`OutputConfiguration`]
//! (flux-workflow) are applied against it to produce a
//! [`WorkflowDataContract`], the value stored in `session.NodeOutputs[N.id]`
//! and handed to successors as their static input context.

use std::collections::HashMap;
use std::time::Duration;

use flux_core::Document;
use flux_workflow::OutputConfiguration;
use serde::{Deserialize, Serialize};

/// A single output file the program runner reported producing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodeOutputFile {
    /// The file's display name.
    pub file_name: String,
    /// Its path as reported by the runner, resolved later through the
    /// file-storage port.
    pub path: String,
}

/// The raw, materialized result of one program-runner invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerOutcome {
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
    /// The process exit code, if the runner reports one.
    pub exit_code: Option<i32>,
    /// Authoritative success flag. Always trusted over `exit_code`: a
    /// `success = false` result is a failure no matter what `exit_code` says.
    pub success: bool,
    /// Wall-clock duration of the invocation.
    #[serde(with = "humantime_serde")]
    pub duration: Duration,
    /// Output files the runner reported, if any.
    #[serde(default)]
    pub output_files: Vec<NodeOutputFile>,
    /// The runner's own structured output document, read by `source_field`
    /// when evaluating output mappings that do not name a well-known field.
    #[serde(default)]
    pub output_document: Document,
}

/// The mapped output values exposed to a node's successors.
pub type WorkflowDataContract = HashMap<String, Document>;

/// A well-known field name evaluable directly off [`RunnerOutcome`], outside
/// of `output_document`.
fn well_known_field(outcome: &RunnerOutcome, field: &str) -> Option<Document> {
    match field {
        "stdout" => Some(Document::String(outcome.stdout.clone())),
        "stderr" => Some(Document::String(outcome.stderr.clone())),
        "exitCode" | "exit_code" => Some(
            outcome
                .exit_code
                .map_or(Document::Null, |code| Document::from(code)),
        ),
        "success" => Some(Document::Bool(outcome.success)),
        "duration" => Some(Document::from(outcome.duration.as_millis() as u64)),
        _ => None,
    }
}

/// Evaluate a node's [`OutputConfiguration`] against a runner outcome.
///
/// Transformation expressions are looked up only by presence; evaluating
/// them is the data propagator's concern (flux-engine), which is the only
/// component that knows the expression language. Here, an unset
/// `transformation` simply passes the source value through unchanged.
#[must_use]
pub fn apply_output_mappings(
    outcome: &RunnerOutcome,
    config: &OutputConfiguration,
) -> WorkflowDataContract {
    let mut contract = WorkflowDataContract::new();
    for mapping in &config.output_mappings {
        let value = well_known_field(outcome, &mapping.source_field)
            .or_else(|| outcome.output_document.get(&mapping.source_field).cloned())
            .unwrap_or(Document::Null);
        contract.insert(mapping.output_name.clone(), value);
    }
    contract
}

#[cfg(test)]
mod tests {
    use super::*;
    use flux_workflow::OutputMapping;
    use std::time::Duration;

    fn outcome(success: bool, exit_code: Option<i32>) -> RunnerOutcome {
        RunnerOutcome {
            stdout: "hello".into(),
            stderr: String::new(),
            exit_code,
            success,
            duration: Duration::from_millis(42),
            output_files: Vec::new(),
            output_document: serde_json::json!({"value": 1}),
        }
    }

    #[test]
    fn maps_well_known_fields() {
        let config = OutputConfiguration {
            output_mappings: vec![OutputMapping {
                output_name: "text".into(),
                source_field: "stdout".into(),
                transformation: None,
            }],
        };
        let contract = apply_output_mappings(&outcome(true, Some(0)), &config);
        assert_eq!(contract.get("text"), Some(&serde_json::json!("hello")));
    }

    #[test]
    fn maps_output_document_field() {
        let config = OutputConfiguration {
            output_mappings: vec![OutputMapping {
                output_name: "value".into(),
                source_field: "value".into(),
                transformation: None,
            }],
        };
        let contract = apply_output_mappings(&outcome(true, Some(0)), &config);
        assert_eq!(contract.get("value"), Some(&serde_json::json!(1)));
    }

    #[test]
    fn missing_field_maps_to_null() {
        let config = OutputConfiguration {
            output_mappings: vec![OutputMapping {
                output_name: "missing".into(),
                source_field: "nope".into(),
                transformation: None,
            }],
        };
        let contract = apply_output_mappings(&outcome(true, Some(0)), &config);
        assert_eq!(contract.get("missing"), Some(&serde_json::Value::Null));
    }

    #[test]
    fn success_false_with_zero_exit_is_still_failure() {
        let result = outcome(false, Some(0));
        assert!(!result.success);
        assert_eq!(result.exit_code, Some(0));
    }

    #[test]
    fn serde_roundtrip() {
        let result = outcome(true, Some(0));
        let json = serde_json::to_string(&result).unwrap();
        let back: RunnerOutcome = serde_json::from_str(&json).unwrap();
        assert_eq!(back.stdout, result.stdout);
        assert_eq!(back.duration, result.duration);
    }
}
