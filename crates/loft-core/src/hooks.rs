//! Upload lifecycle hook
//!
//! The upload engine finishes an upload by writing bytes to a volume; what
//! happens next (metadata registration, cache invalidation, post-processing)
//! belongs to outer layers. This trait is the seam: the api layer implements
//! it, the engine calls it, and tests can substitute a recording fake.

use async_trait::async_trait;
use std::path::PathBuf;
use uuid::Uuid;

use crate::models::FileKind;

/// Everything the engine knows about an upload once its bytes are on disk.
#[derive(Debug, Clone)]
pub struct FinalizedUpload {
    pub file_id: Uuid,
    /// Owner of the connection the upload arrived on, when known.
    pub owner_id: Option<Uuid>,
    /// The client's declared original filename.
    pub filename: String,
    pub kind: FileKind,
    /// Name of the volume the file landed on.
    pub volume: String,
    /// Absolute or root-relative path of the finalized file.
    pub path: PathBuf,
    /// Externally reachable URL.
    pub url: String,
    pub size_bytes: u64,
}

#[async_trait]
pub trait UploadLifecycle: Send + Sync {
    /// Called exactly once per successful finalize, after the filesystem
    /// write and before the success reply is surfaced. An error here fails
    /// the upload.
    async fn upload_finalized(&self, upload: &FinalizedUpload) -> Result<(), anyhow::Error>;
}

/// No-op implementation for configurations without a metadata store.
pub struct NoOpUploadLifecycle;

#[async_trait]
impl UploadLifecycle for NoOpUploadLifecycle {
    async fn upload_finalized(&self, _upload: &FinalizedUpload) -> Result<(), anyhow::Error> {
        Ok(())
    }
}
