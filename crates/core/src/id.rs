//! Strongly-typed identifiers for workflow-engine entities.
//!
//! Each identifier wraps a UUID behind a distinct domain marker via
//! [`domain_key::define_uuid`], so `WorkflowId` and `NodeId` are different
//! types at compile time even though both are 16-byte `Copy` UUIDs. This
//! prevents passing a node id where an execution id is expected.

use domain_key::define_uuid;

pub use domain_key::UuidParseError;

define_uuid!(WorkflowIdDomain => WorkflowId);
define_uuid!(NodeIdDomain => NodeId);
define_uuid!(ExecutionIdDomain => ExecutionId);
define_uuid!(ProgramIdDomain => ProgramId);
define_uuid!(ProgramVersionIdDomain => ProgramVersionId);
define_uuid!(UserIdDomain => UserId);
define_uuid!(InteractionIdDomain => InteractionId);
