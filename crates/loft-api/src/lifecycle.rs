//! What happens after an upload's bytes land on a volume: the file record is
//! registered (when a metadata store is configured) and recognized media
//! files are queued for background compression.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use loft_core::models::FileRecord;
use loft_core::{FinalizedUpload, UploadLifecycle};
use loft_processing::TranscodeDispatcher;
use loft_services::FileService;

pub struct ApiUploadLifecycle {
    files: Option<Arc<FileService>>,
    dispatcher: Arc<TranscodeDispatcher>,
}

impl ApiUploadLifecycle {
    pub fn new(files: Option<Arc<FileService>>, dispatcher: Arc<TranscodeDispatcher>) -> Self {
        Self { files, dispatcher }
    }
}

#[async_trait]
impl UploadLifecycle for ApiUploadLifecycle {
    async fn upload_finalized(&self, upload: &FinalizedUpload) -> Result<(), anyhow::Error> {
        // Registration failures propagate and fail the upload; the client
        // would otherwise hold a URL no listing will ever show.
        if let (Some(files), Some(owner_id)) = (&self.files, upload.owner_id) {
            let now = Utc::now();
            files
                .register_uploaded_file(FileRecord {
                    id: upload.file_id,
                    owner_id,
                    parent_directory_id: None,
                    kind: upload.kind,
                    url: Some(upload.url.clone()),
                    name: upload.filename.clone(),
                    created_at: now,
                    updated_at: now,
                })
                .await?;
        }

        // Post-processing is fire-and-forget and must not affect the upload.
        self.dispatcher
            .dispatch(&upload.filename, upload.file_id, upload.path.clone());

        Ok(())
    }
}
