//! The `Results` record attached to a completed execution (§3).

use std::collections::HashMap;

use flux_core::{Document, NodeId};
use serde::{Deserialize, Serialize};

use crate::output::NodeOutputFile;

/// Final and intermediate outputs of a finished execution.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Results {
    /// Outputs of terminal (exit) nodes, keyed by node id.
    #[serde(default)]
    pub final_outputs: HashMap<NodeId, Document>,
    /// Outputs of every node that ran, keyed by node id.
    #[serde(default)]
    pub intermediate_results: HashMap<NodeId, Document>,
    /// All output files produced across the execution, keyed by node id.
    #[serde(default)]
    pub output_files: HashMap<NodeId, Vec<NodeOutputFile>>,
    /// A human-readable summary suitable for display.
    #[serde(default)]
    pub summary: String,
}

impl Results {
    /// An empty results record with the given summary text.
    #[must_use]
    pub fn with_summary(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            ..Self::default()
        }
    }
}
