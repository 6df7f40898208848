//! The Data Propagator: builds a node's input document from its predecessors'
//! outputs, legacy input mappings, static inputs, and user inputs (§4.3).

use std::collections::HashMap;

use flux_core::{Document, NodeId};
use flux_execution::{ExecutionContext, WorkflowDataContract};
use flux_workflow::Node;

/// Env var the runner request carries the serialized helper artifact under.
pub const INPUT_HELPER_ENV_VAR: &str = "WORKFLOW_INPUTS_CONTENT";

/// Env var a resumed node's runner request carries the raw UI-interaction
/// output document under.
pub const UI_OUTPUT_ENV_VAR: &str = "UI_OUTPUT_DATA";

/// A name→document map of every predecessor's output contract, keyed by its
/// canonical program name. Passed to the runner as a side-channel artifact so
/// a program can read its full upstream context, not just its mapped fields.
pub type InputHelperArtifact = HashMap<String, Document>;

/// One predecessor's contribution to a node's input.
pub struct PredecessorOutput {
    /// The predecessor node.
    pub node_id: NodeId,
    /// Its canonical program name, derived from `Node::name`.
    pub canonical_name: String,
    /// Its recorded output contract.
    pub contract: WorkflowDataContract,
}

/// The result of propagating inputs into a node: the input document itself,
/// the helper artifact to pass alongside it, and any non-fatal warnings
/// (unsatisfied optional mappings, missing-but-defaulted user inputs).
pub struct PropagatedInput {
    /// The assembled input document.
    pub document: Document,
    /// The full predecessor-output side-channel.
    pub helper_artifact: InputHelperArtifact,
    /// Non-fatal issues encountered while building the input.
    pub warnings: Vec<String>,
}

/// Derive a node's canonical program name from its display name.
///
/// Keeps letters and digits, upper-casing the first letter after a run of
/// `' '`/`'_'`/`'-'` separators (and the very first character); all other
/// punctuation is dropped without forcing a case change. A result starting
/// with a digit is prefixed with `"Program"`; an empty result falls back to
/// `"UnknownProgram"`.
#[must_use]
pub fn canonical_program_name(display_name: &str) -> String {
    let mut out = String::with_capacity(display_name.len());
    let mut uppercase_next = true;
    for ch in display_name.chars() {
        if ch == ' ' || ch == '_' || ch == '-' {
            uppercase_next = true;
            continue;
        }
        if !ch.is_alphanumeric() {
            continue;
        }
        if uppercase_next {
            out.extend(ch.to_uppercase());
            uppercase_next = false;
        } else {
            out.push(ch);
        }
    }
    if out.is_empty() {
        return "UnknownProgram".to_string();
    }
    if out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert_str(0, "Program");
    }
    out
}

fn contract_to_document(contract: &WorkflowDataContract) -> Document {
    serde_json::to_value(contract).unwrap_or_else(|_| flux_core::empty_document())
}

/// Build the input document and helper artifact for `node`, given its already
/// resolved predecessor outputs and the execution's context.
///
/// Follows §4.3's four-step construction: predecessor outputs are
/// attached under their canonical program name and folded into the helper
/// artifact; legacy `InputMapping`s resolve next (optional ones degrade to a
/// warning when unsatisfied, matching the Open Question decision in
/// `DESIGN.md`); then static inputs; then user inputs, each falling back to
/// its declared default or else warning if `required`.
#[must_use]
pub fn build_node_input(
    node: &Node,
    predecessors: &[PredecessorOutput],
    context: &ExecutionContext,
) -> PropagatedInput {
    let mut fields = serde_json::Map::new();
    let mut helper_artifact = InputHelperArtifact::new();
    let mut warnings = Vec::new();

    for pred in predecessors {
        let doc = contract_to_document(&pred.contract);
        helper_artifact.insert(pred.canonical_name.clone(), doc.clone());
        fields.insert(pred.canonical_name.clone(), doc);
    }

    for mapping in &node.inputs.input_mappings {
        let source = predecessors
            .iter()
            .find(|p| p.node_id == mapping.source_node_id)
            .and_then(|p| p.contract.get(&mapping.source_output_name).cloned());

        match source {
            Some(value) => {
                fields.insert(mapping.input_name.clone(), value);
            }
            None if mapping.is_optional => {
                if let Some(default) = mapping.default_value.clone() {
                    fields.insert(mapping.input_name.clone(), default);
                } else {
                    warnings.push(format!(
                        "optional input mapping `{}` unsatisfied: predecessor {} has no output `{}`",
                        mapping.input_name, mapping.source_node_id, mapping.source_output_name
                    ));
                }
            }
            None => {
                warnings.push(format!(
                    "input mapping `{}` unsatisfied: predecessor {} has no output `{}`",
                    mapping.input_name, mapping.source_node_id, mapping.source_output_name
                ));
            }
        }
    }

    for (key, value) in &node.inputs.static_inputs {
        fields.insert(key.clone(), value.clone());
    }

    for declared in &node.inputs.user_inputs {
        if let Some(value) = context.user_input(node.id, &declared.name) {
            fields.insert(declared.name.clone(), value.clone());
        } else if let Some(default) = declared.default.clone() {
            fields.insert(declared.name.clone(), default);
        } else if declared.required {
            warnings.push(format!(
                "required user input `{}` was not supplied and has no default",
                declared.name
            ));
        }
    }

    PropagatedInput {
        document: Document::Object(fields),
        helper_artifact,
        warnings,
    }
}

/// Merge a completed UI interaction's output into a node's already-prepared
/// input document, under the first key present in `ui_output` itself — the
/// "first UI-provided key" §4.5's resume step names. `input` is always an
/// object (every document `build_node_input` produces is); a non-object
/// `ui_output`, or one with no keys, has nothing to merge under and is left
/// out of the document (it still reaches the program through `UI_OUTPUT_DATA`).
#[must_use]
pub fn merge_ui_output(input: &Document, ui_output: &Document) -> Document {
    let mut fields = match input {
        Document::Object(map) => map.clone(),
        _ => serde_json::Map::new(),
    };
    if let Document::Object(output_fields) = ui_output {
        if let Some(first_key) = output_fields.keys().next().cloned() {
            fields.insert(first_key, ui_output.clone());
        }
    }
    Document::Object(fields)
}
