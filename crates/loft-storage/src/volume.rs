use std::path::{Path, PathBuf};

use loft_core::config::VolumeSpec;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::{StorageError, StorageResult};

/// One mounted storage directory.
#[derive(Debug, Clone)]
pub struct Volume {
    name: String,
    path: PathBuf,
}

impl Volume {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write a finalized file into this volume and fsync it.
    ///
    /// The filename must be a single path component; anything that could
    /// escape the volume directory is rejected.
    pub async fn write_file(&self, filename: &str, data: &[u8]) -> StorageResult<PathBuf> {
        validate_filename(filename)?;

        let path = self.path.join(filename);
        let start = std::time::Instant::now();

        let mut file = fs::File::create(&path).await.map_err(|e| {
            StorageError::WriteFailed(format!("Failed to create file {}: {}", path.display(), e))
        })?;

        file.write_all(data).await.map_err(|e| {
            StorageError::WriteFailed(format!("Failed to write file {}: {}", path.display(), e))
        })?;

        file.sync_all().await.map_err(|e| {
            StorageError::WriteFailed(format!("Failed to sync file {}: {}", path.display(), e))
        })?;

        tracing::info!(
            volume = %self.name,
            path = %path.display(),
            size_bytes = data.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Volume write successful"
        );

        Ok(path)
    }
}

fn validate_filename(filename: &str) -> StorageResult<()> {
    if filename.is_empty()
        || filename.contains("..")
        || filename.contains('/')
        || filename.contains('\\')
    {
        return Err(StorageError::InvalidFilename(filename.to_string()));
    }
    Ok(())
}

/// The declared volumes, in configuration order. Read-only for the lifetime
/// of the process.
#[derive(Debug)]
pub struct VolumeSet {
    volumes: Vec<Volume>,
}

impl VolumeSet {
    /// Open the configured volumes, creating each directory if absent.
    pub async fn open(specs: &[VolumeSpec]) -> StorageResult<Self> {
        if specs.is_empty() {
            return Err(StorageError::ConfigError(
                "no storage volumes configured".to_string(),
            ));
        }

        let mut volumes = Vec::with_capacity(specs.len());
        for spec in specs {
            fs::create_dir_all(&spec.path).await.map_err(|e| {
                StorageError::ConfigError(format!(
                    "Failed to create volume directory {}: {}",
                    spec.path.display(),
                    e
                ))
            })?;
            volumes.push(Volume {
                name: spec.name.clone(),
                path: spec.path.clone(),
            });
        }

        tracing::info!(count = volumes.len(), "Storage volumes opened");

        Ok(VolumeSet { volumes })
    }

    pub fn volumes(&self) -> &[Volume] {
        &self.volumes
    }

    pub fn get(&self, name: &str) -> Option<&Volume> {
        self.volumes.iter().find(|v| v.name == name)
    }
}
