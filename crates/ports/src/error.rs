//! Error type shared by every port operation.
//!
//! Every port method returns `Result<_, PortsError>`. Backend drivers map
//! their internal errors into these variants so the engine can make
//! retry decisions without inspecting message text.

use std::time::Duration;

/// Error type for all port operations.
#[derive(Debug, thiserror::Error)]
pub enum PortsError {
    /// Entity not found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of entity (e.g. "Workflow", "Execution").
        entity: String,
        /// Identifier that was looked up.
        id: String,
    },

    /// Optimistic concurrency conflict on a versioned write.
    #[error("{entity} {id}: expected version {expected_version}, got {actual_version}")]
    Conflict {
        /// Kind of entity.
        entity: String,
        /// Identifier of the conflicting entity.
        id: String,
        /// Version the caller expected.
        expected_version: u64,
        /// Version currently stored.
        actual_version: u64,
    },

    /// Backend connection failure.
    #[error("connection error: {0}")]
    Connection(String),

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Operation exceeded its timeout.
    #[error("timeout: {operation} after {duration:?}")]
    Timeout {
        /// Name of the operation that timed out.
        operation: String,
        /// How long was waited before giving up.
        duration: Duration,
    },

    /// Catch-all for driver-internal errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl PortsError {
    /// Convenience constructor for [`PortsError::NotFound`].
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Convenience constructor for [`PortsError::Conflict`].
    pub fn conflict(entity: impl Into<String>, id: impl Into<String>, expected: u64, actual: u64) -> Self {
        Self::Conflict {
            entity: entity.into(),
            id: id.into(),
            expected_version: expected,
            actual_version: actual,
        }
    }

    /// Returns `true` for transient errors the caller may retry.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Timeout { .. })
    }
}

impl From<serde_json::Error> for PortsError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_convenience() {
        let err = PortsError::not_found("Workflow", "abc-123");
        match &err {
            PortsError::NotFound { entity, id } => {
                assert_eq!(entity, "Workflow");
                assert_eq!(id, "abc-123");
            }
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn connection_and_timeout_are_retryable() {
        assert!(PortsError::Connection("refused".into()).is_retryable());
        assert!(PortsError::Timeout {
            operation: "op".into(),
            duration: Duration::from_secs(1)
        }
        .is_retryable());
    }

    #[test]
    fn not_found_and_conflict_are_not_retryable() {
        assert!(!PortsError::not_found("X", "1").is_retryable());
        assert!(!PortsError::conflict("X", "1", 0, 1).is_retryable());
    }

    #[test]
    fn from_serde_json_error() {
        let bad = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err: PortsError = bad.into();
        assert!(matches!(err, PortsError::Serialization(_)));
    }

    #[test]
    fn display_conflict() {
        let err = PortsError::conflict("Execution", "e-1", 2, 4);
        assert_eq!(err.to_string(), "Execution e-1: expected version 2, got 4");
    }
}
