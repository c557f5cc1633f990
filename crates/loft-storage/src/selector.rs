use std::path::Path;
use std::sync::Arc;

use crate::{StorageError, StorageResult, Volume, VolumeSet};

/// Picks the least-utilized volume for a new file.
///
/// Usage is recomputed on every call by walking each volume's file tree, so
/// the result is a point-in-time snapshot: two near-simultaneous uploads may
/// land on the same volume. The goal is coarse load spreading, not strict
/// balancing.
#[derive(Clone)]
pub struct VolumeSelector {
    set: Arc<VolumeSet>,
}

impl VolumeSelector {
    pub fn new(set: Arc<VolumeSet>) -> Self {
        Self { set }
    }

    pub fn volume_set(&self) -> &Arc<VolumeSet> {
        &self.set
    }

    /// Select the volume with the strictly smallest used-byte total. Ties
    /// resolve to the first volume in configuration order.
    pub async fn select_volume(&self) -> StorageResult<Volume> {
        let mut selected: Option<(&Volume, u64)> = None;

        for volume in self.set.volumes() {
            let used = usage_bytes(volume.path()).await?;
            tracing::debug!(volume = %volume.name(), used_bytes = used, "Volume usage");

            match selected {
                Some((_, best)) if used >= best => {}
                _ => selected = Some((volume, used)),
            }
        }

        let (volume, used) = selected.ok_or_else(|| {
            StorageError::ConfigError("no storage volumes configured".to_string())
        })?;

        tracing::info!(volume = %volume.name(), used_bytes = used, "Selected storage volume");

        Ok(volume.clone())
    }
}

/// Recursively sum the sizes of all regular files under `root`. Directories
/// contribute no bytes; symlinks are not followed.
pub async fn usage_bytes(root: &Path) -> StorageResult<u64> {
    let mut total = 0u64;
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&dir).await.map_err(|e| {
            StorageError::TraversalFailed(format!("Failed to read {}: {}", dir.display(), e))
        })?;

        while let Some(entry) = entries.next_entry().await.map_err(|e| {
            StorageError::TraversalFailed(format!("Failed to read {}: {}", dir.display(), e))
        })? {
            let file_type = entry.file_type().await.map_err(|e| {
                StorageError::TraversalFailed(format!(
                    "Failed to stat {}: {}",
                    entry.path().display(),
                    e
                ))
            })?;

            if file_type.is_dir() {
                pending.push(entry.path());
            } else if file_type.is_file() {
                let metadata = entry.metadata().await.map_err(|e| {
                    StorageError::TraversalFailed(format!(
                        "Failed to stat {}: {}",
                        entry.path().display(),
                        e
                    ))
                })?;
                total += metadata.len();
            }
        }
    }

    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use loft_core::config::VolumeSpec;
    use tempfile::tempdir;

    async fn selector_with(volumes: &[(&str, &[(&str, usize)])]) -> (tempfile::TempDir, VolumeSelector) {
        let dir = tempdir().unwrap();
        let mut specs = Vec::new();
        for (name, files) in volumes {
            let path = dir.path().join(name);
            std::fs::create_dir_all(&path).unwrap();
            for (file, size) in *files {
                std::fs::write(path.join(file), vec![0u8; *size]).unwrap();
            }
            specs.push(VolumeSpec {
                name: name.to_string(),
                path,
            });
        }
        let set = VolumeSet::open(&specs).await.unwrap();
        (dir, VolumeSelector::new(Arc::new(set)))
    }

    #[tokio::test]
    async fn picks_least_utilized_volume() {
        let (_dir, selector) = selector_with(&[
            ("a", &[("f", 100)]),
            ("b", &[("f", 10)]),
            ("c", &[("f", 50)]),
        ])
        .await;

        assert_eq!(selector.select_volume().await.unwrap().name(), "b");
    }

    #[tokio::test]
    async fn ties_resolve_to_first_in_configuration_order() {
        // A=100, B=50, C=50 -> B
        let (_dir, selector) = selector_with(&[
            ("a", &[("f", 100)]),
            ("b", &[("f", 50)]),
            ("c", &[("f", 50)]),
        ])
        .await;

        assert_eq!(selector.select_volume().await.unwrap().name(), "b");
    }

    #[tokio::test]
    async fn selection_is_deterministic_without_writes() {
        let (_dir, selector) = selector_with(&[
            ("a", &[("f", 30)]),
            ("b", &[("f", 30)]),
        ])
        .await;

        let first = selector.select_volume().await.unwrap();
        let second = selector.select_volume().await.unwrap();
        assert_eq!(first.name(), second.name());
        assert_eq!(first.name(), "a");
    }

    #[tokio::test]
    async fn usage_counts_nested_files_not_directories() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("v");
        std::fs::create_dir_all(root.join("sub/deeper")).unwrap();
        std::fs::write(root.join("top"), vec![0u8; 7]).unwrap();
        std::fs::write(root.join("sub/mid"), vec![0u8; 5]).unwrap();
        std::fs::write(root.join("sub/deeper/leaf"), vec![0u8; 3]).unwrap();

        assert_eq!(usage_bytes(&root).await.unwrap(), 15);
    }

    #[tokio::test]
    async fn missing_volume_directory_is_an_error() {
        let dir = tempdir().unwrap();
        let result = usage_bytes(&dir.path().join("nope")).await;
        assert!(matches!(result, Err(StorageError::TraversalFailed(_))));
    }
}
