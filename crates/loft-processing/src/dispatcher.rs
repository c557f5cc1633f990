//! Background transcode dispatcher
//!
//! A bounded queue drained by a semaphore-capped worker pool. Submission is
//! fire-and-forget: a full queue drops the job with a warning, and a failed
//! job is logged and dropped. Neither ever reaches the upload that scheduled
//! the work.

use std::path::PathBuf;
use std::sync::Arc;

use loft_storage::VolumeSelector;
use tokio::sync::{mpsc, Semaphore};
use uuid::Uuid;

use crate::media;
use crate::transcode::Transcode;

#[derive(Debug, Clone)]
pub struct TranscodeJob {
    pub file_id: Uuid,
    /// The finalized file as the upload left it.
    pub input_path: PathBuf,
}

pub struct TranscodeDispatcher {
    tx: mpsc::Sender<TranscodeJob>,
}

impl TranscodeDispatcher {
    pub fn new(
        transcoder: Arc<dyn Transcode>,
        selector: VolumeSelector,
        max_concurrent: usize,
        queue_size: usize,
    ) -> Self {
        let (tx, rx) = mpsc::channel(queue_size.max(1));

        tokio::spawn(async move {
            Self::worker_pool(rx, transcoder, selector, max_concurrent.max(1)).await;
        });

        tracing::info!(
            queue_size = queue_size.max(1),
            max_concurrent = max_concurrent.max(1),
            "Transcode dispatcher started"
        );

        Self { tx }
    }

    /// Queue a job if the file is a recognized media file. Returns whether a
    /// job was queued.
    pub fn dispatch(&self, filename: &str, file_id: Uuid, input_path: PathBuf) -> bool {
        if !media::is_video_file(filename) {
            return false;
        }

        tracing::info!(file_id = %file_id, filename = %filename, "Video file detected, scheduling compression");
        self.submit(TranscodeJob {
            file_id,
            input_path,
        })
    }

    /// Enqueue a job. A full queue drops the job rather than blocking the
    /// caller.
    pub fn submit(&self, job: TranscodeJob) -> bool {
        match self.tx.try_send(job) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(job)) => {
                tracing::warn!(file_id = %job.file_id, "Transcode queue is full, dropping job");
                false
            }
            Err(mpsc::error::TrySendError::Closed(job)) => {
                tracing::error!(file_id = %job.file_id, "Transcode worker pool is gone, dropping job");
                false
            }
        }
    }

    async fn worker_pool(
        mut rx: mpsc::Receiver<TranscodeJob>,
        transcoder: Arc<dyn Transcode>,
        selector: VolumeSelector,
        max_concurrent: usize,
    ) {
        let semaphore = Arc::new(Semaphore::new(max_concurrent));

        while let Some(job) = rx.recv().await {
            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                break;
            };
            let transcoder = transcoder.clone();
            let selector = selector.clone();

            tokio::spawn(async move {
                let _permit = permit;
                let file_id = job.file_id;
                if let Err(e) = Self::process_job(job, transcoder, selector).await {
                    tracing::error!(file_id = %file_id, error = %e, "Video compression failed");
                }
            });
        }
    }

    async fn process_job(
        job: TranscodeJob,
        transcoder: Arc<dyn Transcode>,
        selector: VolumeSelector,
    ) -> Result<(), anyhow::Error> {
        let volume = selector.select_volume().await?;
        let output_path = volume.path().join(media::compressed_filename(job.file_id));

        tracing::info!(
            file_id = %job.file_id,
            input = %job.input_path.display(),
            output = %output_path.display(),
            "Starting background video compression"
        );

        transcoder.transcode(&job.input_path, &output_path).await?;

        // The compressed copy replaces the original.
        if let Err(e) = tokio::fs::remove_file(&job.input_path).await {
            tracing::warn!(
                file_id = %job.file_id,
                path = %job.input_path.display(),
                error = %e,
                "Failed to delete original after compression"
            );
        } else {
            tracing::info!(
                file_id = %job.file_id,
                path = %job.input_path.display(),
                "Original video deleted after compression"
            );
        }

        Ok(())
    }
}
