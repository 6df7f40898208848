//! The structured document type carried between nodes.
//!
//! Every node input, node output, and `WorkflowDataContract` payload is a
//! [`Document`]. Using `serde_json::Value` directly (rather than a bespoke
//! document enum) keeps propagation a matter of JSON merging, and gives every
//! port trait a serialization format for free.

/// A structured, arbitrarily-nested value flowing between workflow nodes.
pub type Document = serde_json::Value;

/// An empty object document, the default input for nodes with no predecessors.
#[must_use]
pub fn empty_document() -> Document {
    Document::Object(serde_json::Map::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_is_empty_object() {
        assert_eq!(empty_document(), serde_json::json!({}));
    }
}
