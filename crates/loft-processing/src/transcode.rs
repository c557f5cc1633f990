//! Video compression via ffmpeg

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;

/// Ceiling on a single transcode; a hung ffmpeg must not pin a worker
/// forever.
const TRANSCODE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error("input file does not exist: {0}")]
    MissingInput(PathBuf),

    #[error("transcode failed: {0}")]
    Failed(String),

    #[error("transcode timed out after {0:?}")]
    TimedOut(Duration),

    #[error("compressed file was not created: {0}")]
    OutputMissing(PathBuf),
}

/// Seam between the dispatcher and the actual encoder, so the queue can be
/// exercised without ffmpeg on the machine.
#[async_trait]
pub trait Transcode: Send + Sync {
    async fn transcode(&self, input: &Path, output: &Path) -> Result<(), TranscodeError>;
}

pub struct FfmpegTranscoder {
    ffmpeg_path: String,
}

impl FfmpegTranscoder {
    pub fn new(ffmpeg_path: String) -> Self {
        Self { ffmpeg_path }
    }

    fn compression_args(input: &Path, output: &Path) -> Vec<String> {
        vec![
            "-i".to_string(),
            input.to_string_lossy().to_string(),
            "-c:v".to_string(),
            "libx264".to_string(),
            "-crf".to_string(),
            "23".to_string(),
            "-preset".to_string(),
            "medium".to_string(),
            "-c:a".to_string(),
            "aac".to_string(),
            "-b:a".to_string(),
            "128k".to_string(),
            "-movflags".to_string(),
            "+faststart".to_string(),
            "-y".to_string(),
            output.to_string_lossy().to_string(),
        ]
    }
}

#[async_trait]
impl Transcode for FfmpegTranscoder {
    async fn transcode(&self, input: &Path, output: &Path) -> Result<(), TranscodeError> {
        if !tokio::fs::try_exists(input).await.unwrap_or(false) {
            return Err(TranscodeError::MissingInput(input.to_path_buf()));
        }

        let start = std::time::Instant::now();
        tracing::info!(
            input = %input.display(),
            output = %output.display(),
            "Starting video compression"
        );

        let result = tokio::time::timeout(
            TRANSCODE_TIMEOUT,
            Command::new(&self.ffmpeg_path)
                .args(Self::compression_args(input, output))
                .stdout(Stdio::null())
                .stderr(Stdio::piped())
                .output(),
        )
        .await
        .map_err(|_| TranscodeError::TimedOut(TRANSCODE_TIMEOUT))?;

        let output_status = result.map_err(|e| TranscodeError::Failed(e.to_string()))?;
        if !output_status.status.success() {
            let stderr = String::from_utf8_lossy(&output_status.stderr);
            return Err(TranscodeError::Failed(stderr.to_string()));
        }

        if !tokio::fs::try_exists(output).await.unwrap_or(false) {
            return Err(TranscodeError::OutputMissing(output.to_path_buf()));
        }

        // Size comparison is informational only.
        if let (Ok(input_meta), Ok(output_meta)) = (
            tokio::fs::metadata(input).await,
            tokio::fs::metadata(output).await,
        ) {
            let ratio = output_meta.len() as f64 / input_meta.len().max(1) as f64 * 100.0;
            tracing::info!(
                input_bytes = input_meta.len(),
                output_bytes = output_meta.len(),
                ratio_percent = format!("{:.1}", ratio).as_str(),
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Video compression completed"
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compression_args_carry_the_expected_encoder_settings() {
        let args = FfmpegTranscoder::compression_args(Path::new("/in/a.mov"), Path::new("/out/a.mp4"));

        for expected in ["libx264", "23", "medium", "aac", "128k", "+faststart", "-y"] {
            assert!(args.iter().any(|a| a == expected), "missing {}", expected);
        }
        assert_eq!(args.first().map(String::as_str), Some("-i"));
        assert_eq!(args.last().map(String::as_str), Some("/out/a.mp4"));
    }

    #[tokio::test]
    async fn missing_input_is_reported_before_spawning_ffmpeg() {
        let transcoder = FfmpegTranscoder::new("ffmpeg".to_string());
        let result = transcoder
            .transcode(Path::new("/nonexistent/in.mp4"), Path::new("/tmp/out.mp4"))
            .await;
        assert!(matches!(result, Err(TranscodeError::MissingInput(_))));
    }
}
