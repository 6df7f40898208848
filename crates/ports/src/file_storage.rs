//! File storage port.
//!
//! Output files produced by a node's program invocation are never held in
//! the document store; they live behind this port, addressed by the owning
//! program and a path the runner reported.

use async_trait::async_trait;
use bytes::Bytes;
use flux_core::{ExecutionId, ProgramId, ProgramVersionId};

use crate::error::PortsError;

/// Port trait for retrieving and bulk-packaging output file bytes.
#[async_trait]
pub trait FileStorage: Send + Sync {
    /// Fetch one file's bytes.
    async fn get_file_content(
        &self,
        program_id: ProgramId,
        version_ref: Option<ProgramVersionId>,
        path: &str,
    ) -> Result<Bytes, PortsError>;

    /// Package a subset of files as a single zip archive.
    async fn bulk_download_files(
        &self,
        program_id: ProgramId,
        version_ref: Option<ProgramVersionId>,
        paths: &[String],
    ) -> Result<Bytes, PortsError>;

    /// Package every output file of an execution as a single zip archive.
    async fn create_execution_zip_archive(
        &self,
        execution_id: ExecutionId,
    ) -> Result<Bytes, PortsError>;
}
