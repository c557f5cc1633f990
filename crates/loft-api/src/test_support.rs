//! Shared fixtures for in-crate tests.

use std::sync::Arc;

use loft_core::config::VolumeSpec;
use loft_core::{Config, NoOpUploadLifecycle};
use loft_services::FileService;
use loft_storage::{UrlPolicy, VolumeSelector, VolumeSet};
use loft_upload::{SessionLimits, SessionStore};
use tempfile::TempDir;

use crate::state::AppState;

pub async fn state_with(
    environment: &str,
    files: Option<Arc<FileService>>,
    dir: &TempDir,
) -> Arc<AppState> {
    let specs: Vec<VolumeSpec> = ["1", "2"]
        .iter()
        .map(|name| VolumeSpec {
            name: name.to_string(),
            path: dir.path().join(name),
        })
        .collect();
    let set = VolumeSet::open(&specs).await.unwrap();
    let selector = VolumeSelector::new(Arc::new(set));

    let config = Config {
        server_port: 0,
        environment: environment.to_string(),
        base_url: "http://localhost:4000".to_string(),
        storage_root: dir.path().to_path_buf(),
        volumes: specs,
        database_url: None,
        max_session_age_secs: 3600,
        max_session_bytes: 1024 * 1024,
        ffmpeg_path: "ffmpeg".to_string(),
        max_concurrent_transcodes: 1,
        job_queue_size: 8,
    };

    Arc::new(AppState {
        url_policy: UrlPolicy::from_environment(environment),
        config,
        sessions: Arc::new(SessionStore::new(SessionLimits::default())),
        selector,
        lifecycle: Arc::new(NoOpUploadLifecycle),
        files,
    })
}
