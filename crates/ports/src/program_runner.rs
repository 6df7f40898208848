//! Program runner port.
//!
//! The program runner is the external subsystem that actually executes a
//! program inside a sandbox. It is explicitly out of scope for this crate
//! (§1) — this trait is the seam the scheduler calls through.

use async_trait::async_trait;
use flux_core::{Document, ProgramId, ProgramVersionId, UserId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::PortsError;

/// Resource limits applied to a single program invocation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResourceLimits {
    /// Maximum CPU percentage (100 = one full core).
    pub max_cpu_percentage: u32,
    /// Maximum resident memory, in megabytes.
    pub max_memory_mb: u64,
    /// Maximum scratch disk usage, in megabytes.
    pub max_disk_mb: u64,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            max_cpu_percentage: 100,
            max_memory_mb: 512,
            max_disk_mb: 1024,
        }
    }
}

/// A request to execute one program invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectExecutionRequest {
    /// The program to execute.
    pub program_id: ProgramId,
    /// An optional specific program version.
    pub version_id: Option<ProgramVersionId>,
    /// The principal on whose behalf the program runs.
    pub user_id: UserId,
    /// Structured parameters (the node's prepared input document).
    pub parameters: Document,
    /// Environment variables to expose to the sandboxed process.
    pub environment: HashMap<String, String>,
    /// Wall-clock timeout, in minutes.
    pub timeout_minutes: u32,
    /// Resource ceilings for the invocation.
    pub resource_limits: ResourceLimits,
}

/// One output file produced by a program invocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OutputFileRef {
    /// Display name of the file.
    pub file_name: String,
    /// Path at which the file can be retrieved through [`crate::FileStorage`].
    pub path: String,
}

/// The result of one program invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectExecutionResult {
    /// Whether the runner considers the invocation successful.
    ///
    /// Authoritative over `exit_code`: a runner may report `success = false`
    /// alongside `exit_code = 0` (e.g. an internal assertion failure that
    /// the sandbox still exits cleanly from); callers must treat that as a
    /// failure regardless of the exit code.
    pub success: bool,
    /// An opaque id identifying this invocation with the runner.
    pub execution_id: String,
    /// Process exit code, if the process actually exited.
    pub exit_code: Option<i32>,
    /// Captured standard output.
    pub output: String,
    /// Captured standard error.
    pub error_output: String,
    /// Wall-clock duration of the invocation.
    pub duration: std::time::Duration,
    /// Output files the runner materialized.
    pub output_files: Vec<OutputFileRef>,
    /// A human-readable error message when `success` is `false`.
    pub error_message: Option<String>,
}

/// Port trait for executing a program within an isolation boundary.
#[async_trait]
pub trait ProgramRunner: Send + Sync {
    /// Execute one program invocation and wait for it to finish.
    async fn execute_project(
        &self,
        request: ProjectExecutionRequest,
    ) -> Result<ProjectExecutionResult, PortsError>;
}
